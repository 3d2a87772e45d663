//! Request context extraction and authentication middleware.
//!
//! [`request_context_middleware`] runs on every route: it assigns the request
//! ID, computes the request deadline and echoes `x-request-id` on the response.
//! [`auth_middleware`] runs on the acknowledgement routes only: it resolves the
//! caller's identity and attaches it as a typed extension, which handlers read
//! back through the [`Caller`] extractor.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::header::HeaderName;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::time::Instant;
use ulid::Ulid;

use ackgate_core::AuthenticatedIdentity;

use crate::auth::AuthError;
use crate::error::ApiError;
use crate::server::AppState;

/// Header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request context derived from headers and configuration.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request ID for tracing/correlation.
    pub request_id: String,
    /// Instant after which outbound Aggregator calls are abandoned.
    pub deadline: Option<Instant>,
}

impl RequestContext {
    fn from_headers(headers: &HeaderMap, state: &AppState) -> Self {
        let request_id = header_string(headers, REQUEST_ID_HEADER)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Ulid::new().to_string());
        let deadline = state
            .config
            .request_timeout()
            .and_then(|timeout| Instant::now().checked_add(timeout));
        Self {
            request_id,
            deadline,
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ApiError::internal("request context middleware is not installed"))
    }
}

/// The authenticated caller of an acknowledgement route.
#[derive(Debug, Clone)]
pub struct Caller(pub AuthenticatedIdentity);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<AuthenticatedIdentity>() {
            return Ok(Self(identity.clone()));
        }

        tracing::error!("{}", AuthError::TokenNotProvided);
        let err = ApiError::from(AuthError::TokenNotProvided);
        Err(match parts.extensions.get::<RequestContext>() {
            Some(ctx) => err.with_request_id(ctx.request_id.clone()),
            None => err,
        })
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?;
    value.to_str().ok().map(str::to_string)
}

/// Request context middleware.
///
/// Inserts a [`RequestContext`] into request extensions and echoes the request
/// ID on the response.
pub async fn request_context_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let ctx = RequestContext::from_headers(req.headers(), &state);
    let request_id = ctx.request_id.clone();
    req.extensions_mut().insert(ctx);

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

/// Authentication middleware.
///
/// Resolves the caller's identity with the configured scheme and injects it
/// into request extensions. Failures short-circuit with `403 Forbidden`.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match state.identity.resolve(req.headers()) {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(err) => {
            tracing::error!(scheme = %state.identity.scheme(), error = %err, "Authentication failed");
            let mut api = ApiError::from(err);
            if let Some(ctx) = req.extensions().get::<RequestContext>() {
                api = api.with_request_id(ctx.request_id.clone());
            }
            api.into_response()
        }
    }
}
