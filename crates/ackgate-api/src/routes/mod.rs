//! HTTP route handlers.

pub mod acks;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// Acknowledgement routes (authenticated), mounted under the API prefix.
pub fn ack_routes() -> Router<Arc<AppState>> {
    acks::routes()
}
