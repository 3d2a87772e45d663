//! API server implementation.
//!
//! Provides health, `OpenAPI`, metrics and acknowledgement endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{StatusCode, header};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use ackgate_core::{Aggregator, AuthScheme, Error, MemoryAggregator, Result};

use crate::aggregator_client::AggregatorClient;
use crate::auth::IdentityResolver;
use crate::config::Config;

// ============================================================================
// Health Response
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all request handlers.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// The Aggregator every operation is forwarded to.
    pub aggregator: Arc<dyn Aggregator>,
    /// Identity resolver for the configured scheme.
    pub identity: IdentityResolver,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("aggregator", &"<Aggregator>")
            .field("identity", &self.identity)
            .finish()
    }
}

impl AppState {
    /// Creates application state around the given Aggregator.
    #[must_use]
    pub fn new(config: Config, aggregator: Arc<dyn Aggregator>) -> Self {
        let identity = IdentityResolver::new(&config.auth);
        Self {
            config,
            aggregator,
            identity,
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive. This is a shallow check
/// that doesn't call the Aggregator.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn openapi_document() -> impl IntoResponse {
    match crate::openapi::openapi_json() {
        Ok(json) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            json,
        )
            .into_response(),
        Err(err) => {
            crate::error::ApiError::internal(format!("failed to render OpenAPI document: {err}"))
                .into_response()
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// The ackgate API server.
pub struct Server {
    config: Config,
    aggregator: Arc<dyn Aggregator>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("aggregator", &"<Aggregator>")
            .finish()
    }
}

impl Server {
    /// Creates a new server with the given configuration.
    ///
    /// Defaults to an in-memory Aggregator; use `with_aggregator` for production.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_aggregator(config, Arc::new(MemoryAggregator::new()))
    }

    /// Creates a new server with an explicit Aggregator.
    #[must_use]
    pub fn with_aggregator(config: Config, aggregator: Arc<dyn Aggregator>) -> Self {
        Self { config, aggregator }
    }

    /// Creates a server from configuration, connecting to the configured
    /// Aggregator URL or falling back to the in-memory Aggregator in debug mode.
    ///
    /// # Errors
    ///
    /// Returns an error if no Aggregator URL is configured outside debug mode
    /// or the URL is invalid.
    pub fn from_config(config: Config) -> Result<Self> {
        let aggregator: Arc<dyn Aggregator> = match config.aggregator.url.as_deref() {
            Some(url) => {
                tracing::info!(url, "Using Aggregator service");
                Arc::new(AggregatorClient::new(url, config.aggregator_timeout())?)
            }
            None if config.debug => {
                tracing::warn!("ACKGATE_AGGREGATOR_URL not set; using in-memory Aggregator (debug only)");
                Arc::new(MemoryAggregator::new())
            }
            None => {
                return Err(Error::InvalidInput(
                    "ACKGATE_AGGREGATOR_URL is required when ACKGATE_DEBUG=false".to_string(),
                ));
            }
        };
        Ok(Self::with_aggregator(config, aggregator))
    }

    /// Creates a new `ServerBuilder`.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the router with all routes and middleware.
    fn create_router(&self) -> Router {
        let state = Arc::new(AppState::new(
            self.config.clone(),
            Arc::clone(&self.aggregator),
        ));

        let context_layer = middleware::from_fn_with_state(
            Arc::clone(&state),
            crate::context::request_context_middleware,
        );
        let auth_layer =
            middleware::from_fn_with_state(Arc::clone(&state), crate::context::auth_middleware);
        let metrics_layer = middleware::from_fn(crate::metrics::metrics_middleware);

        let router = Router::new()
            // Health, OpenAPI, and metrics endpoints (no auth required)
            .route("/health", get(health))
            .route("/openapi.json", get(openapi_document))
            .route("/metrics", get(crate::metrics::serve_metrics))
            .nest(
                &self.config.api_prefix,
                crate::routes::ack_routes().layer(auth_layer),
            )
            // Middleware (order matters): metrics outermost for timing, then
            // trace, then request context.
            .layer(context_layer)
            .layer(TraceLayer::new_for_http())
            .layer(metrics_layer);

        let router = match self.config.concurrency_limit {
            Some(limit) => router.layer(ConcurrencyLimitLayer::new(limit)),
            None => router,
        };

        router.with_state(state)
    }

    /// Starts the server and blocks until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot start or bind to the port.
    pub async fn serve(&self) -> Result<()> {
        crate::metrics::init_metrics();

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.create_router();

        tracing::info!(
            http_port = self.config.http_port,
            api_prefix = %self.config.api_prefix,
            auth = %self.config.auth.scheme,
            "Starting ackgate API server"
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Internal {
                message: format!("failed to bind to {addr}: {e}"),
            })?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal {
                message: format!("server error: {e}"),
            })?;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Creates a test router for the server.
    ///
    /// This is useful for integration tests where you want to test
    /// the routes without actually binding to a port.
    #[doc(hidden)]
    pub fn test_router(&self) -> Router {
        self.create_router()
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Builder for constructing a server.
pub struct ServerBuilder {
    config: Config,
    aggregator: Arc<dyn Aggregator>,
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("aggregator", &"<Aggregator>")
            .finish()
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            aggregator: Arc::new(MemoryAggregator::new()),
        }
    }
}

impl ServerBuilder {
    /// Creates a new server builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP port.
    #[must_use]
    pub fn http_port(mut self, port: u16) -> Self {
        self.config.http_port = port;
        self
    }

    /// Enables debug mode.
    #[must_use]
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Sets the path prefix for acknowledgement routes.
    #[must_use]
    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.api_prefix = prefix.into();
        self
    }

    /// Selects the authentication scheme.
    #[must_use]
    pub fn auth_scheme(mut self, scheme: AuthScheme) -> Self {
        self.config.auth.scheme = scheme;
        self
    }

    /// Sets the JWT HS256 secret used for bearer token verification.
    #[must_use]
    pub fn jwt_hs256_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.auth.jwt.hs256_secret = Some(secret.into());
        self
    }

    /// Sets the request deadline in seconds (`0` disables it).
    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Bounds the number of in-flight requests.
    #[must_use]
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency_limit = Some(limit);
        self
    }

    /// Sets the Aggregator used by request handlers.
    ///
    /// By default, the server uses an in-memory Aggregator intended only for tests/dev.
    #[must_use]
    pub fn aggregator(mut self, aggregator: Arc<dyn Aggregator>) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        Server {
            config: self.config,
            aggregator: self.aggregator,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_endpoint() -> Result<()> {
        let server = ServerBuilder::new().build();
        let router = server.test_router();

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .context("build request")?;

        let response = router.oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .context("read response body")?;
        let health: HealthResponse = serde_json::from_slice(&body).context("parse JSON body")?;
        assert_eq!(health.status, "ok");
        Ok(())
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() -> Result<()> {
        let router = ServerBuilder::new().build().test_router();

        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "req-123")
            .body(Body::empty())
            .context("build request")?;

        let response = router.oneshot(request).await?;
        assert_eq!(
            response
                .headers()
                .get("x-request-id")
                .context("missing x-request-id")?,
            "req-123"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_openapi_endpoint() -> Result<()> {
        let router = ServerBuilder::new().build().test_router();

        let request = Request::builder()
            .uri("/openapi.json")
            .body(Body::empty())
            .context("build request")?;

        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .context("read response body")?;
        let doc: serde_json::Value = serde_json::from_slice(&body).context("parse JSON body")?;
        assert!(doc["paths"]["/api/v2/ack"].is_object());
        Ok(())
    }

    #[tokio::test]
    async fn test_custom_prefix_mounts_ack_routes() -> Result<()> {
        let router = ServerBuilder::new()
            .api_prefix("/api/insights/v1")
            .build()
            .test_router();

        let request = Request::builder()
            .uri("/api/insights/v1/ack")
            .body(Body::empty())
            .context("build request")?;

        // Mounted: reaches the auth layer rather than 404.
        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[test]
    fn test_from_config_requires_aggregator_outside_debug() {
        let err = Server::from_config(Config::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref msg) if msg.contains("ACKGATE_AGGREGATOR_URL")));

        let debug = Config {
            debug: true,
            ..Config::default()
        };
        assert!(Server::from_config(debug).is_ok());

        let mut remote = Config::default();
        remote.aggregator.url = Some("http://aggregator:8080/api/v1/".to_string());
        assert!(Server::from_config(remote).is_ok());
    }
}
