//! Error types and result aliases for ackgate.
//!
//! This module defines the shared error type used by the domain primitives and
//! by every [`Aggregator`](crate::aggregator::Aggregator) implementation.
//! Errors are structured so the HTTP layer can map them to status codes
//! without inspecting messages.

use std::fmt;

/// The result type used throughout ackgate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ackgate operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A rule selector did not have the `rule_id|error_key` shape.
    #[error("improper rule selector format: '{selector}'")]
    MalformedSelector {
        /// The selector exactly as received.
        selector: String,
    },

    /// The Aggregator could not be reached or failed server-side.
    #[error("aggregator unavailable: {message}")]
    AggregatorUnavailable {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The Aggregator refused the request as invalid.
    #[error("aggregator rejected request ({status}): {message}")]
    AggregatorRejected {
        /// HTTP status returned by the Aggregator.
        status: u16,
        /// Message returned by the Aggregator.
        message: String,
    },

    /// The Aggregator has no acknowledgement for the requested key.
    #[error("acknowledgement not found: {rule}")]
    RecordNotFound {
        /// Rule selector of the missing acknowledgement.
        rule: String,
    },

    /// The request deadline elapsed before an Aggregator call completed.
    #[error("deadline exceeded during {step}")]
    DeadlineExceeded {
        /// The orchestrator step that was interrupted.
        step: &'static str,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new malformed selector error.
    #[must_use]
    pub fn malformed_selector(selector: impl Into<String>) -> Self {
        Self::MalformedSelector {
            selector: selector.into(),
        }
    }

    /// Creates a new Aggregator unavailability error with the given message.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::AggregatorUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new Aggregator unavailability error with a source cause.
    #[must_use]
    pub fn unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::AggregatorUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new record not found error.
    #[must_use]
    pub fn record_not_found(rule: impl fmt::Display) -> Self {
        Self::RecordNotFound {
            rule: rule.to_string(),
        }
    }

    /// Returns true if the Aggregator reported the record as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn unavailable_with_source_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::unavailable_with_source("connect failed", io);
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "aggregator unavailable: connect failed");
    }

    #[test]
    fn not_found_is_distinguished() {
        assert!(Error::record_not_found("abc|xyz").is_not_found());
        assert!(!Error::unavailable("down").is_not_found());
    }
}
