//! API error types and HTTP response mapping.

use axum::Json;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::HeaderName;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use ackgate_core::{AckError, Error as CoreError};

use crate::auth::AuthError;
use crate::context::REQUEST_ID_HEADER;

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// Standard JSON error response body.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message (safe for clients).
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Optional request ID for correlation.
    pub request_id: Option<String>,
}

/// HTTP API error with stable machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    request_id: Option<String>,
}

impl ApiError {
    /// Returns an error response for invalid input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Returns an error response for authentication failures.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    /// Returns an error response for missing resources.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Returns an error response when the Aggregator state contradicts a
    /// mutation that just succeeded.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    /// Returns an error response when the Aggregator failed.
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "AGGREGATOR_UNAVAILABLE", message)
    }

    /// Returns an error response when the request deadline elapsed.
    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, "DEADLINE_EXCEEDED", message)
    }

    /// Returns an internal error response.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }

    /// Attaches a request ID for correlation.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Prefixes the message with additional context.
    #[must_use]
    pub fn context(mut self, context: impl std::fmt::Display) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the human-readable error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the request ID, if one was attached.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Returns the stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            request_id: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = self.request_id;
        let mut response = (
            self.status,
            Json(ApiErrorBody {
                code: self.code.to_string(),
                message: self.message,
                request_id: request_id.clone(),
            }),
        )
            .into_response();

        if let Some(request_id) = request_id {
            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
            }
        }

        response
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        Self::forbidden(value.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::MalformedSelector { .. } | CoreError::InvalidInput(_) => {
                Self::bad_request(value.to_string())
            }
            CoreError::RecordNotFound { rule } => {
                Self::not_found(format!("rule {rule} has not been acknowledged"))
            }
            CoreError::AggregatorRejected { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "AGGREGATOR_REJECTED", value.to_string())
            }
            CoreError::AggregatorUnavailable { .. } | CoreError::Serialization { .. } => {
                Self::bad_gateway(value.to_string())
            }
            CoreError::DeadlineExceeded { .. } => Self::gateway_timeout(value.to_string()),
            CoreError::Internal { message } => Self::internal(message),
        }
    }
}

impl From<AckError> for ApiError {
    fn from(value: AckError) -> Self {
        match value {
            AckError::NotAcknowledged { rule } => {
                Self::not_found(format!("rule {rule} has not been acknowledged"))
            }
            AckError::Aggregator { step, source } => {
                // Not-found already names the rule.
                if source.is_not_found() {
                    Self::from(source)
                } else {
                    Self::from(source).context(format!("aggregator {step} failed"))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ackgate_core::AckStep;

    use super::*;

    #[test]
    fn auth_errors_are_forbidden() {
        for err in [
            AuthError::MissingToken,
            AuthError::MalformedToken,
            AuthError::TokenNotProvided,
        ] {
            let api = ApiError::from(err);
            assert_eq!(api.status(), StatusCode::FORBIDDEN);
            assert_eq!(api.message(), err.to_string());
        }
    }

    #[test]
    fn core_errors_follow_status_policy() {
        let cases = [
            (CoreError::malformed_selector("abc"), StatusCode::BAD_REQUEST),
            (CoreError::record_not_found("a|b"), StatusCode::NOT_FOUND),
            (
                CoreError::AggregatorRejected {
                    status: 422,
                    message: "no".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (CoreError::unavailable("down"), StatusCode::BAD_GATEWAY),
            (
                CoreError::Serialization {
                    message: "bad".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                CoreError::DeadlineExceeded { step: "create" },
                StatusCode::GATEWAY_TIMEOUT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn ack_errors_name_the_failed_step() {
        let err = ApiError::from(AckError::Aggregator {
            step: AckStep::Create,
            source: CoreError::unavailable("connection refused"),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert!(err.message().starts_with("aggregator create failed"));

        let err = ApiError::from(AckError::Aggregator {
            step: AckStep::Update,
            source: CoreError::record_not_found("a|b"),
        });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = ApiError::from(AckError::NotAcknowledged { rule: "a|b".into() });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn response_carries_request_id() {
        let response = ApiError::forbidden("Missing auth token")
            .with_request_id("req-1")
            .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).unwrap(),
            "req-1"
        );
    }
}
