//! Aggregator collaborator abstraction.
//!
//! The Aggregator is the authoritative store of acknowledgements. The gateway
//! never caches what it returns; every call is a live round trip.
//!
//! [`MemoryAggregator`] is a process-local implementation for tests and
//! debug deployments. It stamps `created_at`/`updated_at` itself, mirroring
//! how the real service enriches records the mutation call never echoes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ack::{AckKey, AcknowledgementRecord};
use crate::error::{Error, Result};
use crate::identity::{OrgId, UserId};
use crate::selector::RuleSelector;

/// Calls the gateway makes against the Aggregator.
///
/// Implementations must not retry; retry policy belongs to the caller.
#[async_trait]
pub trait Aggregator: Send + Sync + 'static {
    /// Reads one acknowledgement.
    ///
    /// Returns `Ok(None)` when the rule is not acknowledged.
    async fn read_ack(&self, key: &AckKey) -> Result<Option<AcknowledgementRecord>>;

    /// Acknowledges a rule with the given justification.
    async fn create_ack(&self, key: &AckKey, justification: &str) -> Result<()>;

    /// Replaces the justification of an existing acknowledgement.
    ///
    /// Returns `Error::RecordNotFound` if the rule is not acknowledged.
    async fn update_ack(&self, key: &AckKey, justification: &str) -> Result<()>;

    /// Removes an acknowledgement.
    ///
    /// Returns `Error::RecordNotFound` if the rule is not acknowledged.
    async fn delete_ack(&self, key: &AckKey) -> Result<()>;

    /// Lists every acknowledgement of the (org, user) pair.
    async fn list_acks(&self, org_id: OrgId, user_id: &UserId)
        -> Result<Vec<AcknowledgementRecord>>;
}

#[derive(Debug, Clone)]
struct StoredAck {
    justification: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredAck {
    fn to_record(&self, key: &AckKey) -> AcknowledgementRecord {
        AcknowledgementRecord {
            rule: key.selector.to_string(),
            justification: self.justification.clone(),
            created_by: key.user_id.to_string(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// In-memory Aggregator for tests and local development.
#[derive(Debug, Default, Clone)]
pub struct MemoryAggregator {
    acks: Arc<RwLock<HashMap<AckKey, StoredAck>>>,
}

impl MemoryAggregator {
    /// Creates an empty in-memory Aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored acknowledgements across all accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read_guard()?.len())
    }

    /// Returns true when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read_guard()?.is_empty())
    }

    fn read_guard(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<AckKey, StoredAck>>> {
        self.acks.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }

    fn write_guard(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<AckKey, StoredAck>>> {
        self.acks.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }
}

#[async_trait]
impl Aggregator for MemoryAggregator {
    async fn read_ack(&self, key: &AckKey) -> Result<Option<AcknowledgementRecord>> {
        let acks = self.read_guard()?;
        Ok(acks.get(key).map(|stored| stored.to_record(key)))
    }

    async fn create_ack(&self, key: &AckKey, justification: &str) -> Result<()> {
        let now = Utc::now();
        let mut acks = self.write_guard()?;
        acks.entry(key.clone())
            .and_modify(|stored| {
                stored.justification = justification.to_string();
                stored.updated_at = now;
            })
            .or_insert_with(|| StoredAck {
                justification: justification.to_string(),
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn update_ack(&self, key: &AckKey, justification: &str) -> Result<()> {
        let mut acks = self.write_guard()?;
        let stored = acks
            .get_mut(key)
            .ok_or_else(|| Error::record_not_found(&key.selector))?;
        stored.justification = justification.to_string();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_ack(&self, key: &AckKey) -> Result<()> {
        let mut acks = self.write_guard()?;
        acks.remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::record_not_found(&key.selector))
    }

    async fn list_acks(
        &self,
        org_id: OrgId,
        user_id: &UserId,
    ) -> Result<Vec<AcknowledgementRecord>> {
        let acks = self.read_guard()?;
        let mut records: Vec<(&RuleSelector, AcknowledgementRecord)> = acks
            .iter()
            .filter(|(key, _)| key.org_id == org_id && &key.user_id == user_id)
            .map(|(key, stored)| (&key.selector, stored.to_record(key)))
            .collect();
        // HashMap order is arbitrary; present oldest first.
        records.sort_by(|(a_sel, a), (b_sel, b)| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a_sel.to_string().cmp(&b_sel.to_string()))
        });
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(org: u32, user: &str, selector: &str) -> AckKey {
        AckKey::new(
            OrgId::new(org),
            UserId::new(user),
            RuleSelector::parse(selector).unwrap(),
        )
    }

    #[tokio::test]
    async fn create_then_read_enriches_record() {
        let aggregator = MemoryAggregator::new();
        let key = key(1, "1", "abc|xyz");

        assert!(aggregator.read_ack(&key).await.unwrap().is_none());
        aggregator.create_ack(&key, "known issue").await.unwrap();

        let record = aggregator.read_ack(&key).await.unwrap().unwrap();
        assert_eq!(record.rule, "abc|xyz");
        assert_eq!(record.justification, "known issue");
        assert_eq!(record.created_by, "1");
        assert_eq!(record.created_at, record.updated_at);
    }

    #[tokio::test]
    async fn update_and_delete_missing_report_not_found() {
        let aggregator = MemoryAggregator::new();
        let key = key(1, "1", "abc|xyz");

        let err = aggregator.update_ack(&key, "x").await.unwrap_err();
        assert!(err.is_not_found());
        let err = aggregator.delete_ack(&key).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(aggregator.is_empty().unwrap());
    }

    #[tokio::test]
    async fn list_is_scoped_to_org_and_user() {
        let aggregator = MemoryAggregator::new();
        aggregator.create_ack(&key(1, "1", "a|A"), "j").await.unwrap();
        aggregator.create_ack(&key(1, "2", "b|B"), "j").await.unwrap();
        aggregator.create_ack(&key(2, "1", "c|C"), "j").await.unwrap();

        let listed = aggregator
            .list_acks(OrgId::new(1), &UserId::new("1"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].rule, "a|A");
        assert_eq!(aggregator.len().unwrap(), 3);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let aggregator = MemoryAggregator::new();
        let key = key(7, "u", "r|K");
        aggregator.create_ack(&key, "j").await.unwrap();
        aggregator.delete_ack(&key).await.unwrap();
        assert!(aggregator.read_ack(&key).await.unwrap().is_none());
    }
}
