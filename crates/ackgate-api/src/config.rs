//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use ackgate_core::{AuthScheme, Error, Redacted, Result};

/// Configuration for the ackgate API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server port.
    pub http_port: u16,

    /// Enable debug mode.
    ///
    /// When enabled:
    /// - logs are pretty-printed instead of JSON
    /// - an in-memory Aggregator is used if no Aggregator URL is configured
    pub debug: bool,

    /// Path prefix the acknowledgement routes are mounted under.
    pub api_prefix: String,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Aggregator client configuration.
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// End-to-end deadline for one request, in seconds. `0` disables it.
    pub request_timeout_secs: u64,

    /// Maximum number of in-flight requests.
    #[serde(default)]
    pub concurrency_limit: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            debug: false,
            api_prefix: default_api_prefix(),
            auth: AuthConfig::default(),
            aggregator: AggregatorConfig::default(),
            request_timeout_secs: 30,
            concurrency_limit: None,
        }
    }
}

fn default_api_prefix() -> String {
    "/api/v2".to_string()
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthConfig {
    /// Which header scheme authenticates requests.
    #[serde(default)]
    pub scheme: AuthScheme,

    /// JWT settings, used when `scheme` is [`AuthScheme::Jwt`].
    #[serde(default)]
    pub jwt: JwtConfig,
}

/// JWT verification and claim mapping.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwtConfig {
    /// HS256 secret used to verify bearer tokens.
    ///
    /// When unset, signatures are not verified and the upstream gateway is
    /// trusted to have done so.
    #[serde(default)]
    pub hs256_secret: Option<String>,

    /// Claim name that contains the organization identifier.
    #[serde(default = "default_org_claim")]
    pub org_claim: String,

    /// Claim name that contains the account number.
    #[serde(default = "default_account_claim")]
    pub account_claim: String,

    /// Claim name that contains the user identifier.
    #[serde(default = "default_user_claim")]
    pub user_claim: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            hs256_secret: None,
            org_claim: default_org_claim(),
            account_claim: default_account_claim(),
            user_claim: default_user_claim(),
        }
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("hs256_secret", &self.hs256_secret.as_ref().map(Redacted))
            .field("org_claim", &self.org_claim)
            .field("account_claim", &self.account_claim)
            .field("user_claim", &self.user_claim)
            .finish()
    }
}

fn default_org_claim() -> String {
    "org_id".to_string()
}

fn default_account_claim() -> String {
    "account_number".to_string()
}

fn default_user_claim() -> String {
    "user_id".to_string()
}

/// Aggregator client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Base URL of the Aggregator service.
    ///
    /// Required unless `debug` is enabled.
    #[serde(default)]
    pub url: Option<String>,

    /// Per-call HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `ACKGATE_HTTP_PORT`
    /// - `ACKGATE_DEBUG`
    /// - `ACKGATE_API_PREFIX`
    /// - `ACKGATE_AUTH_TYPE` (`jwt` | `xrh`)
    /// - `ACKGATE_JWT_SECRET`
    /// - `ACKGATE_JWT_ORG_CLAIM`
    /// - `ACKGATE_JWT_ACCOUNT_CLAIM`
    /// - `ACKGATE_JWT_USER_CLAIM`
    /// - `ACKGATE_AGGREGATOR_URL`
    /// - `ACKGATE_AGGREGATOR_TIMEOUT_SECS`
    /// - `ACKGATE_REQUEST_TIMEOUT_SECS` (`0` disables the request deadline)
    /// - `ACKGATE_CONCURRENCY_LIMIT`
    ///
    /// Empty/whitespace values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if any environment variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(&lookup);
        let mut config = Self::default();

        if let Some(port) = env.u16("ACKGATE_HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(debug) = env.bool("ACKGATE_DEBUG")? {
            config.debug = debug;
        }
        if let Some(prefix) = env.string("ACKGATE_API_PREFIX") {
            config.api_prefix = normalize_prefix("ACKGATE_API_PREFIX", &prefix)?;
        }

        if let Some(scheme) = env.string("ACKGATE_AUTH_TYPE") {
            config.auth.scheme = parse_auth_scheme("ACKGATE_AUTH_TYPE", &scheme)?;
        }
        config.auth.jwt.hs256_secret = env.string("ACKGATE_JWT_SECRET");
        if let Some(claim) = env.string("ACKGATE_JWT_ORG_CLAIM") {
            config.auth.jwt.org_claim = claim;
        }
        if let Some(claim) = env.string("ACKGATE_JWT_ACCOUNT_CLAIM") {
            config.auth.jwt.account_claim = claim;
        }
        if let Some(claim) = env.string("ACKGATE_JWT_USER_CLAIM") {
            config.auth.jwt.user_claim = claim;
        }

        config.aggregator.url = env.string("ACKGATE_AGGREGATOR_URL");
        if let Some(secs) = env.u64("ACKGATE_AGGREGATOR_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(Error::InvalidInput(
                    "ACKGATE_AGGREGATOR_TIMEOUT_SECS must be greater than 0".to_string(),
                ));
            }
            config.aggregator.timeout_secs = secs;
        }

        if let Some(secs) = env.u64("ACKGATE_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout_secs = secs;
        }
        if let Some(limit) = env.usize("ACKGATE_CONCURRENCY_LIMIT")? {
            if limit == 0 {
                return Err(Error::InvalidInput(
                    "ACKGATE_CONCURRENCY_LIMIT must be greater than 0".to_string(),
                ));
            }
            config.concurrency_limit = Some(limit);
        }

        Ok(config)
    }

    /// Returns the request deadline budget, if one is configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Returns the per-call Aggregator timeout.
    #[must_use]
    pub fn aggregator_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregator.timeout_secs)
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn u16(&self, name: &str) -> Result<Option<u16>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u16>()
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{name} must be a u16: {e}")))
    }

    fn u64(&self, name: &str) -> Result<Option<u64>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u64>()
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
    }

    fn usize(&self, name: &str) -> Result<Option<usize>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<usize>()
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{name} must be a usize: {e}")))
    }

    fn bool(&self, name: &str) -> Result<Option<bool>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        parse_bool(name, &v).map(Some)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn parse_auth_scheme(name: &str, value: &str) -> Result<AuthScheme> {
    let scheme = value.trim().to_ascii_lowercase();
    match scheme.as_str() {
        "jwt" => Ok(AuthScheme::Jwt),
        "xrh" => Ok(AuthScheme::Xrh),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be one of: jwt, xrh (got {value})"
        ))),
    }
}

fn normalize_prefix(name: &str, value: &str) -> Result<String> {
    if !value.starts_with('/') {
        return Err(Error::InvalidInput(format!(
            "{name} must start with '/' (got {value})"
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() -> Result<()> {
        let config = load(&[])?;
        assert_eq!(config.http_port, 8080);
        assert!(!config.debug);
        assert_eq!(config.api_prefix, "/api/v2");
        assert_eq!(config.auth.scheme, AuthScheme::Xrh);
        assert_eq!(config.auth.jwt.org_claim, "org_id");
        assert_eq!(config.auth.jwt.user_claim, "user_id");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.aggregator_timeout(), Duration::from_secs(30));
        assert!(config.aggregator.url.is_none());
        assert!(config.concurrency_limit.is_none());
        Ok(())
    }

    #[test]
    fn reads_all_variables() -> Result<()> {
        let config = load(&[
            ("ACKGATE_HTTP_PORT", "9000"),
            ("ACKGATE_DEBUG", "yes"),
            ("ACKGATE_API_PREFIX", "/api/insights/v1/"),
            ("ACKGATE_AUTH_TYPE", "JWT"),
            ("ACKGATE_JWT_SECRET", "s3cret"),
            ("ACKGATE_JWT_USER_CLAIM", "sub"),
            ("ACKGATE_AGGREGATOR_URL", "http://aggregator:8080/api/v1/"),
            ("ACKGATE_AGGREGATOR_TIMEOUT_SECS", "5"),
            ("ACKGATE_REQUEST_TIMEOUT_SECS", "0"),
            ("ACKGATE_CONCURRENCY_LIMIT", "64"),
        ])?;
        assert_eq!(config.http_port, 9000);
        assert!(config.debug);
        assert_eq!(config.api_prefix, "/api/insights/v1");
        assert_eq!(config.auth.scheme, AuthScheme::Jwt);
        assert_eq!(config.auth.jwt.hs256_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.auth.jwt.user_claim, "sub");
        assert_eq!(
            config.aggregator.url.as_deref(),
            Some("http://aggregator:8080/api/v1/")
        );
        assert_eq!(config.aggregator_timeout(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.concurrency_limit, Some(64));
        Ok(())
    }

    #[test]
    fn whitespace_values_are_unset() -> Result<()> {
        let config = load(&[("ACKGATE_JWT_SECRET", "   "), ("ACKGATE_HTTP_PORT", " ")])?;
        assert!(config.auth.jwt.hs256_secret.is_none());
        assert_eq!(config.http_port, 8080);
        Ok(())
    }

    #[test]
    fn rejects_unparseable_values() {
        for vars in [
            [("ACKGATE_HTTP_PORT", "eighty")],
            [("ACKGATE_DEBUG", "maybe")],
            [("ACKGATE_AUTH_TYPE", "basic")],
            [("ACKGATE_API_PREFIX", "api/v2")],
            [("ACKGATE_CONCURRENCY_LIMIT", "0")],
            [("ACKGATE_AGGREGATOR_TIMEOUT_SECS", "0")],
        ] {
            let err = load(&vars).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(ref msg) if msg.contains(vars[0].0)));
        }
    }

    #[test]
    fn parse_bool_accepts_true_values() {
        assert!(parse_bool("TEST", "true").unwrap());
        assert!(parse_bool("TEST", "1").unwrap());
        assert!(parse_bool("TEST", "YES").unwrap());
        assert!(!parse_bool("TEST", "false").unwrap());
        assert!(!parse_bool("TEST", "0").unwrap());
        assert!(!parse_bool("TEST", "no").unwrap());
    }

    #[test]
    fn debug_output_redacts_jwt_secret() {
        let jwt = JwtConfig {
            hs256_secret: Some("super-secret".to_string()),
            ..JwtConfig::default()
        };
        let rendered = format!("{jwt:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
