//! Acknowledgement lifecycle orchestration.
//!
//! Each operation is a strictly sequential series of Aggregator calls for a
//! single [`AckKey`]:
//!
//! ```text
//! get:         existence check
//! acknowledge: existence check -> create (only if absent) -> re-read
//! update:      existence check -> update -> re-read
//! delete:      existence check -> delete
//! ```
//!
//! The Aggregator is the source of truth, so records returned to callers come
//! either from the existence check or from the re-read that follows a
//! mutation. A failed re-read does not roll anything back; it is reported as
//! [`MutationOutcome::Unconfirmed`] and callers resolve it with a later `get`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;

use crate::ack::{AckKey, AcknowledgementList, AcknowledgementRecord};
use crate::aggregator::Aggregator;
use crate::error::Error;
use crate::identity::{OrgId, UserId};

/// A single Aggregator round trip within an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStep {
    /// Listing all acknowledgements of an account.
    List,
    /// Reading the key before acting on it.
    ExistenceCheck,
    /// Creating the acknowledgement.
    Create,
    /// Replacing the justification.
    Update,
    /// Removing the acknowledgement.
    Delete,
    /// Reading the key back after a mutation.
    Reread,
}

impl AckStep {
    /// Stable name used in logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::ExistenceCheck => "existence check",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Reread => "re-read",
        }
    }
}

impl fmt::Display for AckStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a mutating operation did to the Aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// The rule was unacknowledged and is now acknowledged.
    Created,
    /// The rule was already acknowledged; nothing was written.
    AlreadyAcknowledged,
    /// The justification was replaced.
    Updated,
}

/// Why the confirming re-read did not produce a record.
#[derive(Debug)]
pub enum RereadFailure {
    /// The Aggregator answered but the record is gone.
    Vanished,
    /// The request deadline elapsed before the re-read finished.
    DeadlineExceeded,
    /// The re-read call itself failed.
    Aggregator(Error),
}

impl fmt::Display for RereadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vanished => f.write_str("record disappeared before it could be re-read"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded during re-read"),
            Self::Aggregator(err) => write!(f, "re-read failed: {err}"),
        }
    }
}

/// Result of a mutation followed by its mandatory re-read.
#[derive(Debug)]
pub enum MutationOutcome {
    /// The mutation was applied (or skipped) and the re-read confirmed it.
    Confirmed {
        /// What was done.
        mutation: Mutation,
        /// The record as read back from the Aggregator.
        record: AcknowledgementRecord,
    },
    /// The mutation was applied but the state could not be confirmed.
    Unconfirmed {
        /// What was done.
        mutation: Mutation,
        /// Why the re-read failed.
        reason: RereadFailure,
    },
}

impl MutationOutcome {
    /// Returns the mutation regardless of confirmation.
    #[must_use]
    pub const fn mutation(&self) -> Mutation {
        match self {
            Self::Confirmed { mutation, .. } | Self::Unconfirmed { mutation, .. } => *mutation,
        }
    }

    /// Returns the confirmed record, if any.
    #[must_use]
    pub fn record(&self) -> Option<&AcknowledgementRecord> {
        match self {
            Self::Confirmed { record, .. } => Some(record),
            Self::Unconfirmed { .. } => None,
        }
    }
}

/// Failures that happen before any mutation is applied.
#[derive(Debug, thiserror::Error)]
pub enum AckError {
    /// The existence check found no acknowledgement.
    #[error("rule {rule} has not been acknowledged")]
    NotAcknowledged {
        /// Rule selector that was looked up.
        rule: String,
    },
    /// An Aggregator call failed.
    #[error("{step} failed: {source}")]
    Aggregator {
        /// The step that failed.
        step: AckStep,
        /// The Aggregator error.
        #[source]
        source: Error,
    },
}

impl AckError {
    fn aggregator(step: AckStep) -> impl FnOnce(Error) -> Self {
        move |source| Self::Aggregator { step, source }
    }
}

/// Runs acknowledgement operations against an [`Aggregator`].
///
/// One orchestrator is built per request; it holds no state besides the
/// request deadline.
#[derive(Clone)]
pub struct AckOrchestrator {
    aggregator: Arc<dyn Aggregator>,
    deadline: Option<Instant>,
}

impl fmt::Debug for AckOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckOrchestrator")
            .field("aggregator", &"<Aggregator>")
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl AckOrchestrator {
    /// Creates an orchestrator without a deadline.
    #[must_use]
    pub fn new(aggregator: Arc<dyn Aggregator>) -> Self {
        Self {
            aggregator,
            deadline: None,
        }
    }

    /// Bounds every Aggregator call by the given deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Lists all acknowledgements of the account.
    ///
    /// # Errors
    ///
    /// Returns [`AckError::Aggregator`] if the list call fails.
    #[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %user_id))]
    pub async fn list(
        &self,
        org_id: OrgId,
        user_id: &UserId,
    ) -> Result<AcknowledgementList, AckError> {
        let records = self
            .call(AckStep::List, self.aggregator.list_acks(org_id, user_id))
            .await
            .map_err(AckError::aggregator(AckStep::List))?;
        tracing::debug!(count = records.len(), "Listed acknowledgements");
        Ok(AcknowledgementList::from(records))
    }

    /// Returns the acknowledgement for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`AckError::NotAcknowledged`] if the rule is not acknowledged.
    #[tracing::instrument(
        skip(self, key),
        fields(
            org_id = %key.org_id,
            user_id = %key.user_id,
            rule_id = key.selector.rule_id(),
            error_key = key.selector.error_key(),
        )
    )]
    pub async fn get(&self, key: &AckKey) -> Result<AcknowledgementRecord, AckError> {
        self.existing(key).await?.ok_or_else(|| {
            tracing::info!("Rule has not been acknowledged; nothing to return");
            AckError::NotAcknowledged {
                rule: key.selector.to_string(),
            }
        })
    }

    /// Acknowledges the rule unless it already is.
    ///
    /// An existing acknowledgement keeps its justification; `justification`
    /// is only used when creating.
    ///
    /// # Errors
    ///
    /// Returns [`AckError::Aggregator`] if the existence check or the create
    /// call fails.
    #[tracing::instrument(
        skip(self, key, justification),
        fields(
            org_id = %key.org_id,
            user_id = %key.user_id,
            rule_id = key.selector.rule_id(),
            error_key = key.selector.error_key(),
        )
    )]
    pub async fn acknowledge(
        &self,
        key: &AckKey,
        justification: &str,
    ) -> Result<MutationOutcome, AckError> {
        let mutation = if self.existing(key).await?.is_some() {
            tracing::info!("Rule has already been acknowledged");
            Mutation::AlreadyAcknowledged
        } else {
            tracing::info!(justification, "Acknowledging rule");
            self.call(AckStep::Create, self.aggregator.create_ack(key, justification))
                .await
                .map_err(AckError::aggregator(AckStep::Create))?;
            Mutation::Created
        };
        Ok(self.reread(key, mutation).await)
    }

    /// Replaces the justification of an existing acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`AckError::NotAcknowledged`] if there is nothing to update and
    /// [`AckError::Aggregator`] if a call before the re-read fails.
    #[tracing::instrument(
        skip(self, key, justification),
        fields(
            org_id = %key.org_id,
            user_id = %key.user_id,
            rule_id = key.selector.rule_id(),
            error_key = key.selector.error_key(),
        )
    )]
    pub async fn update(
        &self,
        key: &AckKey,
        justification: &str,
    ) -> Result<MutationOutcome, AckError> {
        if self.existing(key).await?.is_none() {
            tracing::info!("Rule ack can not be found; create it first");
            return Err(AckError::NotAcknowledged {
                rule: key.selector.to_string(),
            });
        }

        tracing::info!(justification, "Updating justification");
        self.call(AckStep::Update, self.aggregator.update_ack(key, justification))
            .await
            .map_err(AckError::aggregator(AckStep::Update))?;
        Ok(self.reread(key, Mutation::Updated).await)
    }

    /// Removes an existing acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`AckError::NotAcknowledged`] if the rule is not acknowledged
    /// and [`AckError::Aggregator`] if a call fails.
    #[tracing::instrument(
        skip(self, key),
        fields(
            org_id = %key.org_id,
            user_id = %key.user_id,
            rule_id = key.selector.rule_id(),
            error_key = key.selector.error_key(),
        )
    )]
    pub async fn delete(&self, key: &AckKey) -> Result<(), AckError> {
        if self.existing(key).await?.is_none() {
            tracing::info!("Rule has not been acknowledged; ack won't be deleted");
            return Err(AckError::NotAcknowledged {
                rule: key.selector.to_string(),
            });
        }

        tracing::info!("Deleting acknowledgement");
        self.call(AckStep::Delete, self.aggregator.delete_ack(key))
            .await
            .map_err(AckError::aggregator(AckStep::Delete))
    }

    async fn existing(&self, key: &AckKey) -> Result<Option<AcknowledgementRecord>, AckError> {
        self.call(AckStep::ExistenceCheck, self.aggregator.read_ack(key))
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "Read rule status error");
                AckError::Aggregator {
                    step: AckStep::ExistenceCheck,
                    source: err,
                }
            })
    }

    async fn reread(&self, key: &AckKey, mutation: Mutation) -> MutationOutcome {
        match self.call(AckStep::Reread, self.aggregator.read_ack(key)).await {
            Ok(Some(record)) => MutationOutcome::Confirmed { mutation, record },
            Ok(None) => {
                tracing::warn!(?mutation, "Acknowledgement vanished before re-read");
                MutationOutcome::Unconfirmed {
                    mutation,
                    reason: RereadFailure::Vanished,
                }
            }
            Err(Error::DeadlineExceeded { .. }) => {
                tracing::warn!(?mutation, "Deadline exceeded before re-read completed");
                MutationOutcome::Unconfirmed {
                    mutation,
                    reason: RereadFailure::DeadlineExceeded,
                }
            }
            Err(err) => {
                tracing::error!(?mutation, error = %err, "Unable to re-read acknowledgement");
                MutationOutcome::Unconfirmed {
                    mutation,
                    reason: RereadFailure::Aggregator(err),
                }
            }
        }
    }

    async fn call<T, F>(&self, step: AckStep, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .unwrap_or_else(|_| {
                    Err(Error::DeadlineExceeded {
                        step: step.as_str(),
                    })
                }),
            None => fut.await,
        }
    }
}
