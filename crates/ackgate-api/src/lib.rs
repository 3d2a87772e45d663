//! # ackgate-api
//!
//! HTTP gateway for rule acknowledgements.
//!
//! This crate provides the API surface in front of the Aggregator, handling:
//!
//! - **Authentication**: Identity resolution from a JWT bearer token or a
//!   base64 identity header
//! - **Routing**: Acknowledgement endpoints under a configurable prefix
//! - **Forwarding**: The Aggregator REST client
//! - **Observability**: Metrics, tracing, and health checks
//!
//! ## Design Principles
//!
//! This crate is a **thin composition layer**. The acknowledgement workflow
//! lives in `ackgate-core`; the Aggregator remains the source of truth.
//!
//! ## Endpoints
//!
//! ```text
//! GET    /health                        - Health check
//! GET    /openapi.json                  - OpenAPI document
//! GET    /metrics                       - Prometheus metrics
//! GET    /api/v2/ack                    - List acknowledgements
//! POST   /api/v2/ack                    - Acknowledge a rule
//! GET    /api/v2/ack/{rule_selector}    - Get one acknowledgement
//! PUT    /api/v2/ack/{rule_selector}    - Update the justification
//! DELETE /api/v2/ack/{rule_selector}    - Remove an acknowledgement
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ackgate_api::server::Server;
//!
//! let server = Server::builder()
//!     .http_port(8080)
//!     .debug(true)
//!     .build();
//!
//! server.serve().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod aggregator_client;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod openapi;
pub mod render;
pub mod routes;
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::aggregator_client::AggregatorClient;
    pub use crate::auth::IdentityResolver;
    pub use crate::config::Config;
    pub use crate::context::{Caller, RequestContext};
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::server::{Server, ServerBuilder};
}
