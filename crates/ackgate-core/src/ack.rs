//! Acknowledgement records as confirmed by the Aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{OrgId, UserId};
use crate::selector::RuleSelector;

/// Key of one acknowledgement in the Aggregator's keyspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AckKey {
    /// Owning organization.
    pub org_id: OrgId,
    /// Acknowledging user.
    pub user_id: UserId,
    /// Acknowledged rule variant.
    pub selector: RuleSelector,
}

impl AckKey {
    /// Creates a key.
    #[must_use]
    pub fn new(org_id: OrgId, user_id: UserId, selector: RuleSelector) -> Self {
        Self {
            org_id,
            user_id,
            selector,
        }
    }
}

/// An acknowledgement as last read from the Aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgementRecord {
    /// Rule selector in `rule_id|error_key` form.
    pub rule: String,
    /// Free text supplied when acknowledging.
    pub justification: String,
    /// User that created the acknowledgement.
    pub created_by: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last justification change.
    pub updated_at: DateTime<Utc>,
}

/// All acknowledgements of one (org, user) pair, in Aggregator order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcknowledgementList {
    /// Acknowledgements.
    pub items: Vec<AcknowledgementRecord>,
}

impl AcknowledgementList {
    /// Number of acknowledgements.
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Returns true when nothing is acknowledged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<AcknowledgementRecord>> for AcknowledgementList {
    fn from(items: Vec<AcknowledgementRecord>) -> Self {
        Self { items }
    }
}
