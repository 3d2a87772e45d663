//! HTTP client for the Aggregator service.
//!
//! Every call is a single round trip; nothing is retried or cached.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ackgate_core::{
    AckKey, AcknowledgementRecord, Aggregator, Error, OrgId, Result, RuleSelector, UserId,
};

/// Default per-call timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client implementing [`Aggregator`].
#[derive(Debug, Clone)]
pub struct AggregatorClient {
    base_url: Url,
    client: reqwest::Client,
}

impl AggregatorClient {
    /// Creates a new client targeting the given base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::InvalidInput(format!("invalid aggregator URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::InvalidInput(format!(
                "aggregator URL must be http(s): {base_url}"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal {
                message: format!("failed to build aggregator HTTP client: {e}"),
            })?;
        Ok(Self { base_url, client })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Internal {
                message: format!("aggregator URL cannot be a base: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn ack_url(&self, key: &AckKey, action: Option<&str>) -> Result<Url> {
        let org_id = key.org_id.to_string();
        let mut segments = vec![
            "rules",
            key.selector.rule_id(),
            "error_key",
            key.selector.error_key(),
            "organizations",
            org_id.as_str(),
            "users",
            key.user_id.as_str(),
        ];
        segments.extend(action);
        self.url(&segments)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        call: &'static str,
        rule: &str,
    ) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(call, error = %e, "Aggregator request failed");
            Error::unavailable_with_source(format!("{call} request failed"), e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.map_err(|e| {
            Error::unavailable_with_source(format!("failed reading {call} error body"), e)
        })?;
        let message = serde_json::from_slice::<Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("status")
                    .or_else(|| value.get("message"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| String::from_utf8_lossy(&body).to_string());

        if status == StatusCode::NOT_FOUND {
            tracing::debug!(call, rule, "Aggregator has no such acknowledgement");
            return Err(Error::record_not_found(rule));
        }

        tracing::warn!(call, status = status.as_u16(), %message, "Aggregator returned an error");
        Err(match status {
            s if s.is_client_error() => Error::AggregatorRejected {
                status: s.as_u16(),
                message,
            },
            s => Error::unavailable(format!("{call} failed ({s}): {message}")),
        })
    }
}

#[derive(Debug, Serialize)]
struct JustificationBody<'a> {
    justification: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisabledRuleResponse {
    disabled_rule: DisabledRule,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisabledRulesResponse {
    #[serde(default)]
    disabled_rules: Vec<DisabledRule>,
}

#[derive(Debug, Deserialize)]
struct DisabledRule {
    user_id: String,
    rule_id: String,
    error_key: String,
    #[serde(default)]
    justification: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<Value>,
}

impl DisabledRule {
    fn into_record(self) -> Result<AcknowledgementRecord> {
        let rule = RuleSelector::new(self.rule_id, self.error_key).map_err(|e| {
            Error::Serialization {
                message: format!("aggregator returned an unusable rule: {e}"),
            }
        })?;
        let updated_at = self
            .updated_at
            .as_ref()
            .and_then(updated_at_from_value)
            .unwrap_or(self.created_at);
        Ok(AcknowledgementRecord {
            rule: rule.to_string(),
            justification: self.justification,
            created_by: self.user_id,
            created_at: self.created_at,
            updated_at,
        })
    }
}

/// Accepts either an RFC 3339 string or a `{"Time": ..., "Valid": bool}`
/// nullable timestamp.
fn updated_at_from_value(value: &Value) -> Option<DateTime<Utc>> {
    let raw = match value {
        Value::String(s) => s.as_str(),
        Value::Object(obj) => {
            if !obj.get("Valid").and_then(Value::as_bool).unwrap_or(false) {
                return None;
            }
            obj.get("Time")?.as_str()?
        }
        _ => return None,
    };
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    call: &'static str,
) -> Result<T> {
    response.json::<T>().await.map_err(|e| Error::Serialization {
        message: format!("invalid {call} response: {e}"),
    })
}

#[async_trait]
impl Aggregator for AggregatorClient {
    async fn read_ack(&self, key: &AckKey) -> Result<Option<AcknowledgementRecord>> {
        let url = self.ack_url(key, None)?;
        tracing::debug!(%url, "Reading acknowledgement");
        match self.send(self.client.get(url), "read", &key.selector.to_string()).await {
            Ok(response) => {
                let body: DisabledRuleResponse = decode(response, "read").await?;
                body.disabled_rule.into_record().map(Some)
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create_ack(&self, key: &AckKey, justification: &str) -> Result<()> {
        let url = self.ack_url(key, Some("disable"))?;
        tracing::debug!(%url, "Disabling rule");
        let request = self.client.put(url).json(&JustificationBody { justification });
        self.send(request, "disable", &key.selector.to_string())
            .await
            .map(drop)
    }

    async fn update_ack(&self, key: &AckKey, justification: &str) -> Result<()> {
        let url = self.ack_url(key, Some("update"))?;
        tracing::debug!(%url, "Updating rule justification");
        let request = self.client.post(url).json(&JustificationBody { justification });
        self.send(request, "update", &key.selector.to_string())
            .await
            .map(drop)
    }

    async fn delete_ack(&self, key: &AckKey) -> Result<()> {
        let url = self.ack_url(key, Some("enable"))?;
        tracing::debug!(%url, "Enabling rule");
        self.send(self.client.put(url), "enable", &key.selector.to_string())
            .await
            .map(drop)
    }

    async fn list_acks(
        &self,
        org_id: OrgId,
        user_id: &UserId,
    ) -> Result<Vec<AcknowledgementRecord>> {
        let org_id = org_id.to_string();
        let url = self.url(&[
            "rules",
            "organizations",
            org_id.as_str(),
            "users",
            user_id.as_str(),
            "disabled_system_wide",
        ])?;
        tracing::debug!(%url, "Listing disabled rules");
        let response = self.send(self.client.get(url), "list", "*").await?;
        let body: DisabledRulesResponse = decode(response, "list").await?;
        body.disabled_rules
            .into_iter()
            .map(DisabledRule::into_record)
            .collect()
    }
}
