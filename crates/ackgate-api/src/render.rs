//! Response rendering for acknowledgement routes.
//!
//! Projects orchestrator results onto the wire payloads and status codes. No
//! business decisions are made here.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use ackgate_core::{AcknowledgementList, AcknowledgementRecord, Mutation, MutationOutcome, RereadFailure};

use crate::error::{ApiError, ApiResult};

/// A single acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AckResponse {
    /// Rule selector (`rule_id|error_key`).
    #[schema(example = "ccx_rules_ocp.external.rules.nodes_kubelet_version_check|NODE_KUBELET_VERSION")]
    pub rule: String,
    /// Why the rule was acknowledged.
    pub justification: String,
    /// User that acknowledged the rule.
    pub created_by: String,
    /// Creation timestamp (RFC 3339, UTC, second precision).
    #[schema(example = "2021-09-04T17:11:35Z")]
    pub created_at: String,
    /// Last update timestamp (RFC 3339, UTC, second precision).
    #[schema(example = "2021-09-04T17:11:35Z")]
    pub updated_at: String,
}

impl From<AcknowledgementRecord> for AckResponse {
    fn from(record: AcknowledgementRecord) -> Self {
        Self {
            created_at: timestamp(record.created_at),
            updated_at: timestamp(record.updated_at),
            rule: record.rule,
            justification: record.justification,
            created_by: record.created_by,
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// List metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ListMeta {
    /// Number of items in `data`.
    pub count: usize,
}

/// Pagination links. Always empty; lists are not paginated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ListLinks {}

/// Envelope for the acknowledgement list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AckListResponse {
    /// List metadata.
    pub meta: ListMeta,
    /// Pagination links.
    pub links: ListLinks,
    /// Acknowledgements.
    pub data: Vec<AckResponse>,
}

impl From<AcknowledgementList> for AckListResponse {
    fn from(list: AcknowledgementList) -> Self {
        Self {
            meta: ListMeta {
                count: list.count(),
            },
            links: ListLinks::default(),
            data: list.items.into_iter().map(AckResponse::from).collect(),
        }
    }
}

/// Successful result of an acknowledgement route.
#[derive(Debug)]
pub enum AckReply {
    /// `200` with the list envelope.
    List(AcknowledgementList),
    /// `200` with a single record.
    Found(AcknowledgementRecord),
    /// `201` with the newly created record.
    Created(AcknowledgementRecord),
    /// `204` with no body.
    Deleted,
}

impl AckReply {
    /// Renders a mutation outcome.
    ///
    /// # Errors
    ///
    /// Returns an error response when the mutation could not be confirmed by
    /// the re-read: `409` if the record vanished, `504` if the deadline
    /// elapsed and `502` if the re-read failed.
    pub fn from_outcome(outcome: MutationOutcome) -> ApiResult<Self> {
        match outcome {
            MutationOutcome::Confirmed {
                mutation: Mutation::Created,
                record,
            } => Ok(Self::Created(record)),
            MutationOutcome::Confirmed {
                mutation: Mutation::AlreadyAcknowledged | Mutation::Updated,
                record,
            } => Ok(Self::Found(record)),
            MutationOutcome::Unconfirmed { mutation, reason } => {
                let done = match mutation {
                    Mutation::Created => "rule was acknowledged",
                    Mutation::AlreadyAcknowledged => "rule is already acknowledged",
                    Mutation::Updated => "justification was updated",
                };
                let hint = "re-read it with GET";
                Err(match reason {
                    RereadFailure::Vanished => ApiError::conflict(format!(
                        "{done} but the acknowledgement was not found afterwards; {hint}"
                    )),
                    RereadFailure::DeadlineExceeded => ApiError::gateway_timeout(format!(
                        "{done} but the deadline elapsed before it could be confirmed; {hint}"
                    )),
                    RereadFailure::Aggregator(err) => ApiError::bad_gateway(format!(
                        "{done} but could not be confirmed ({err}); {hint}"
                    )),
                })
            }
        }
    }

    /// Returns the HTTP status of this reply.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::List(_) | Self::Found(_) => StatusCode::OK,
            Self::Created(_) => StatusCode::CREATED,
            Self::Deleted => StatusCode::NO_CONTENT,
        }
    }
}

impl IntoResponse for AckReply {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::List(list) => (status, Json(AckListResponse::from(list))).into_response(),
            Self::Found(record) | Self::Created(record) => {
                (status, Json(AckResponse::from(record))).into_response()
            }
            Self::Deleted => status.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use ackgate_core::Error;

    use super::*;

    fn record() -> AcknowledgementRecord {
        let at = Utc.with_ymd_and_hms(2021, 9, 4, 17, 11, 35).unwrap()
            + chrono::Duration::microseconds(130_896);
        AcknowledgementRecord {
            rule: "abc|xyz".into(),
            justification: "known".into(),
            created_by: "1".into(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn record_shape_and_timestamp_precision() {
        let body = serde_json::to_value(AckResponse::from(record())).unwrap();
        assert_eq!(
            body,
            json!({
                "rule": "abc|xyz",
                "justification": "known",
                "created_by": "1",
                "created_at": "2021-09-04T17:11:35Z",
                "updated_at": "2021-09-04T17:11:35Z"
            })
        );
    }

    #[test]
    fn empty_list_envelope() {
        let body = serde_json::to_string(&AckListResponse::from(AcknowledgementList::default()))
            .unwrap();
        assert_eq!(body, r#"{"meta":{"count":0},"links":{},"data":[]}"#);
    }

    #[test]
    fn confirmed_outcomes_map_to_status() {
        let created = AckReply::from_outcome(MutationOutcome::Confirmed {
            mutation: Mutation::Created,
            record: record(),
        })
        .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);

        for mutation in [Mutation::AlreadyAcknowledged, Mutation::Updated] {
            let reply = AckReply::from_outcome(MutationOutcome::Confirmed {
                mutation,
                record: record(),
            })
            .unwrap();
            assert_eq!(reply.status(), StatusCode::OK);
        }

        assert_eq!(AckReply::Deleted.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn unconfirmed_outcomes_are_errors() {
        let cases = [
            (RereadFailure::Vanished, StatusCode::CONFLICT),
            (RereadFailure::DeadlineExceeded, StatusCode::GATEWAY_TIMEOUT),
            (
                RereadFailure::Aggregator(Error::unavailable("down")),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (reason, status) in cases {
            let err = AckReply::from_outcome(MutationOutcome::Unconfirmed {
                mutation: Mutation::Created,
                reason,
            })
            .unwrap_err();
            assert_eq!(err.status(), status);
            assert!(err.message().contains("GET"));
        }
    }
}
