//! # ackgate-core
//!
//! Domain primitives for the rule acknowledgement gateway.
//!
//! - **Identity**: the org/user/account triple resolved from authentication
//! - **Rule Selectors**: the `rule_id|error_key` codec
//! - **Aggregator**: the collaborator that stores acknowledgements
//! - **Orchestration**: existence check, mutation and confirming re-read
//! - **Error Types**: shared error definitions and result types
//!
//! ## Example
//!
//! ```rust
//! use ackgate_core::prelude::*;
//!
//! let selector = RuleSelector::parse("ccx.rules.node|NODE_DOWN").unwrap();
//! assert_eq!(selector.error_key(), "NODE_DOWN");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod ack;
pub mod aggregator;
pub mod error;
pub mod identity;
pub mod observability;
pub mod orchestrator;
pub mod selector;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use ackgate_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::ack::{AckKey, AcknowledgementList, AcknowledgementRecord};
    pub use crate::aggregator::{Aggregator, MemoryAggregator};
    pub use crate::error::{Error, Result};
    pub use crate::identity::{AccountNumber, AuthScheme, AuthenticatedIdentity, Identity, OrgId, UserId};
    pub use crate::orchestrator::{
        AckError, AckOrchestrator, AckStep, Mutation, MutationOutcome, RereadFailure,
    };
    pub use crate::selector::RuleSelector;
}

pub use ack::{AckKey, AcknowledgementList, AcknowledgementRecord};
pub use aggregator::{Aggregator, MemoryAggregator};
pub use error::{Error, Result};
pub use identity::{AccountNumber, AuthScheme, AuthenticatedIdentity, Identity, OrgId, UserId};
pub use observability::{LogFormat, Redacted, ack_span, init_logging};
pub use orchestrator::{AckError, AckOrchestrator, AckStep, Mutation, MutationOutcome, RereadFailure};
pub use selector::RuleSelector;
