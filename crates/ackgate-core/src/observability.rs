//! Observability infrastructure for ackgate.
//!
//! Structured logging with consistent spans. Every acknowledgement operation
//! runs inside an [`ack_span`] carrying the caller's organization and user so
//! log lines from the orchestrator and the Aggregator client can be correlated.

use std::fmt;
use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::identity::{OrgId, UserId};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `ackgate_api=debug`)
///
/// # Example
///
/// ```rust
/// use ackgate_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        // try_init: a test harness may already have installed a subscriber.
        let _ = match format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer::layer().json())
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer::layer().pretty())
                .try_init(),
        };
    });
}

/// Creates a span for acknowledgement operations with standard fields.
///
/// # Example
///
/// ```rust
/// use ackgate_core::identity::{OrgId, UserId};
/// use ackgate_core::observability::ack_span;
///
/// let span = ack_span("acknowledge", OrgId::new(1), &UserId::new("42"));
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn ack_span(operation: &str, org_id: OrgId, user_id: &UserId) -> Span {
    tracing::info_span!(
        "ack",
        op = operation,
        org_id = org_id.get(),
        user_id = user_id.as_str(),
    )
}

/// Wrapper that hides its contents from `Debug` and `Display` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Redacted<T>(pub T);

impl<T> Redacted<T> {
    /// Returns the wrapped value.
    #[must_use]
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
