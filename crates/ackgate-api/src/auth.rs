//! Identity resolution from request headers.
//!
//! Exactly one scheme is active per deployment:
//!
//! - `jwt`: `Authorization: Bearer <jwt>`. The HS256 signature is verified when
//!   a secret is configured; otherwise the token is only decoded and the
//!   upstream gateway is trusted to have verified it.
//! - `xrh`: `x-rh-identity: <base64 JSON>` attached by the upstream gateway.
//!
//! Both schemes yield the same org/user/account triple.

use axum::http::HeaderMap;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use serde_json::Value;

use ackgate_core::{AccountNumber, AuthScheme, AuthenticatedIdentity, Identity, OrgId, UserId};

use crate::config::{AuthConfig, JwtConfig};

/// Authentication failures. All of them map to `403 Forbidden`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The active scheme's header is absent or empty.
    #[error("Missing auth token")]
    MissingToken,
    /// The header is present but cannot be decoded into an identity.
    #[error("Invalid/Malformed auth token")]
    MalformedToken,
    /// A handler ran without an identity attached to the request.
    #[error("token is not provided")]
    TokenNotProvided,
}

/// Extracts the credential carried by the active scheme's header.
///
/// For the bearer scheme this is the token after `Bearer `; for the identity
/// header scheme it is the raw header value, decoded later.
///
/// # Errors
///
/// Returns [`AuthError::MissingToken`] if the header is absent or empty and
/// [`AuthError::MalformedToken`] if a bearer header is not `Bearer <token>`.
pub fn auth_token_header(scheme: AuthScheme, headers: &HeaderMap) -> Result<String, AuthError> {
    let value = headers
        .get(scheme.header_name())
        .map(|v| v.to_str().map(str::trim))
        .transpose()
        .map_err(|_| AuthError::MalformedToken)?
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingToken)?;

    match scheme {
        AuthScheme::Xrh => Ok(value.to_string()),
        AuthScheme::Jwt => {
            let parts: Vec<&str> = value.split(' ').collect();
            match parts.as_slice() {
                [prefix, token] if prefix.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
                    Ok((*token).to_string())
                }
                _ => Err(AuthError::MalformedToken),
            }
        }
    }
}

/// Resolves an [`AuthenticatedIdentity`] for the configured scheme.
#[derive(Debug)]
pub struct IdentityResolver {
    scheme: AuthScheme,
    jwt: JwtVerifier,
}

impl IdentityResolver {
    /// Builds a resolver from the authentication configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            scheme: config.scheme,
            jwt: JwtVerifier::new(config.jwt.clone()),
        }
    }

    /// Returns the active scheme.
    #[must_use]
    pub const fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    /// Resolves the caller's identity from request headers.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingToken`] or [`AuthError::MalformedToken`].
    pub fn resolve(&self, headers: &HeaderMap) -> Result<AuthenticatedIdentity, AuthError> {
        let token = auth_token_header(self.scheme, headers)?;
        match self.scheme {
            AuthScheme::Jwt => self.jwt.verify(&token).map(AuthenticatedIdentity::Bearer),
            AuthScheme::Xrh => decode_identity_header(&token).map(AuthenticatedIdentity::IdentityHeader),
        }
    }
}

/// Decodes bearer JWTs into identities.
pub struct JwtVerifier {
    config: JwtConfig,
    key: DecodingKey,
    validation: Validation,
    verifies_signature: bool,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("config", &self.config)
            .field("verifies_signature", &self.verifies_signature)
            .finish_non_exhaustive()
    }
}

impl JwtVerifier {
    /// Creates a verifier for the given configuration.
    #[must_use]
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_aud = false;

        let verifies_signature = config.hs256_secret.is_some();
        let key = if let Some(secret) = config.hs256_secret.as_deref() {
            DecodingKey::from_secret(secret.as_bytes())
        } else {
            validation.insecure_disable_signature_validation();
            DecodingKey::from_secret(&[])
        };

        Self {
            config,
            key,
            validation,
            verifies_signature,
        }
    }

    /// Decodes `token` and extracts the configured identity claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedToken`] if the token cannot be decoded or
    /// lacks a usable org or user claim.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Value>(token, &self.key, &self.validation).map_err(|err| {
            tracing::warn!(error = %err, "Unable to decode bearer token");
            AuthError::MalformedToken
        })?;

        let Some(claims) = data.claims.as_object() else {
            return Err(AuthError::MalformedToken);
        };

        let org_id = claims
            .get(&self.config.org_claim)
            .and_then(org_id_from_value)
            .ok_or_else(|| {
                tracing::warn!(claim = %self.config.org_claim, "Bearer token lacks a numeric org id");
                AuthError::MalformedToken
            })?;
        let user_id = claims
            .get(&self.config.user_claim)
            .and_then(string_from_value)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                tracing::warn!(claim = %self.config.user_claim, "Bearer token lacks a user id");
                AuthError::MalformedToken
            })?;
        let account_number = claims
            .get(&self.config.account_claim)
            .and_then(string_from_value)
            .unwrap_or_default();

        Ok(Identity::new(
            org_id,
            UserId::new(user_id),
            AccountNumber::new(account_number),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct XrhEnvelope {
    identity: XrhIdentity,
}

#[derive(Debug, Deserialize)]
struct XrhIdentity {
    #[serde(default)]
    account_number: String,
    org_id: Value,
    user: XrhUser,
}

#[derive(Debug, Deserialize)]
struct XrhUser {
    user_id: String,
}

/// Decodes a base64 `x-rh-identity` header value.
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] on invalid base64, invalid JSON, or a
/// missing/non-numeric org id or missing user id.
pub fn decode_identity_header(value: &str) -> Result<Identity, AuthError> {
    let bytes = STANDARD.decode(value).map_err(|err| {
        tracing::warn!(error = %err, "Identity header is not valid base64");
        AuthError::MalformedToken
    })?;
    let envelope: XrhEnvelope = serde_json::from_slice(&bytes).map_err(|err| {
        tracing::warn!(error = %err, "Identity header is not a valid identity document");
        AuthError::MalformedToken
    })?;

    let identity = envelope.identity;
    let org_id = org_id_from_value(&identity.org_id).ok_or_else(|| {
        tracing::warn!("Identity header lacks a numeric org id");
        AuthError::MalformedToken
    })?;
    if identity.user.user_id.is_empty() {
        tracing::warn!("Identity header lacks a user id");
        return Err(AuthError::MalformedToken);
    }

    Ok(Identity::new(
        org_id,
        UserId::new(identity.user.user_id),
        AccountNumber::new(identity.account_number),
    ))
}

fn org_id_from_value(value: &Value) -> Option<OrgId> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
    .map(OrgId::new)
}

fn string_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    use super::*;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn xrh(doc: &Value) -> String {
        STANDARD.encode(doc.to_string())
    }

    fn jwt(claims: &Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn jwt_config(secret: Option<&str>) -> JwtConfig {
        JwtConfig {
            hs256_secret: secret.map(str::to_string),
            ..JwtConfig::default()
        }
    }

    #[test]
    fn header_check_requires_presence() {
        for scheme in [AuthScheme::Jwt, AuthScheme::Xrh] {
            assert_eq!(
                auth_token_header(scheme, &HeaderMap::new()),
                Err(AuthError::MissingToken)
            );
            assert_eq!(
                auth_token_header(scheme, &headers(scheme.header_name(), "")),
                Err(AuthError::MissingToken)
            );
        }
    }

    #[test]
    fn bearer_header_must_have_two_parts() {
        for value in ["token", "Bearer", "Bearer a b", "Token abc"] {
            assert_eq!(
                auth_token_header(AuthScheme::Jwt, &headers("authorization", value)),
                Err(AuthError::MalformedToken),
                "{value:?}"
            );
        }
        assert_eq!(
            auth_token_header(AuthScheme::Jwt, &headers("authorization", "Bearer abc")),
            Ok("abc".to_string())
        );
    }

    #[test]
    fn identity_header_check_only_asserts_presence() {
        assert_eq!(
            auth_token_header(AuthScheme::Xrh, &headers("x-rh-identity", "token")),
            Ok("token".to_string())
        );
    }

    #[test]
    fn decodes_identity_header_with_string_or_numeric_org() {
        for org in [json!("1"), json!(1)] {
            let value = xrh(&json!({
                "identity": {
                    "account_number": "6212377",
                    "org_id": org,
                    "user": {"user_id": "1"}
                }
            }));
            let identity = decode_identity_header(&value).unwrap();
            assert_eq!(identity.org_id, OrgId::new(1));
            assert_eq!(identity.user_id.as_str(), "1");
            assert_eq!(identity.account_number.as_str(), "6212377");
        }
    }

    #[test]
    fn rejects_undecodable_identity_headers() {
        let cases = [
            "token".to_string(),
            STANDARD.encode("not json"),
            xrh(&json!({"identity": {"org_id": "abc", "user": {"user_id": "1"}}})),
            xrh(&json!({"identity": {"user": {"user_id": "1"}}})),
            xrh(&json!({"identity": {"org_id": "1", "user": {"user_id": ""}}})),
            xrh(&json!({"identity": {"org_id": "1"}})),
        ];
        for value in cases {
            assert_eq!(
                decode_identity_header(&value),
                Err(AuthError::MalformedToken),
                "{value:?}"
            );
        }
    }

    #[test]
    fn verifies_signed_jwt_when_secret_configured() {
        let verifier = JwtVerifier::new(jwt_config(Some("secret")));
        let token = jwt(
            &json!({"org_id": "42", "user_id": "7", "account_number": "a1"}),
            "secret",
        );
        let identity = verifier.verify(&token).unwrap();
        assert_eq!(identity.org_id, OrgId::new(42));
        assert_eq!(identity.user_id.as_str(), "7");
        assert_eq!(identity.account_number.as_str(), "a1");

        let forged = jwt(&json!({"org_id": "42", "user_id": "7"}), "other");
        assert_eq!(verifier.verify(&forged), Err(AuthError::MalformedToken));
    }

    #[test]
    fn decodes_without_verification_when_no_secret() {
        let verifier = JwtVerifier::new(jwt_config(None));
        let token = jwt(&json!({"org_id": 5, "user_id": "u"}), "whatever");
        let identity = verifier.verify(&token).unwrap();
        assert_eq!(identity.org_id, OrgId::new(5));
        assert!(identity.account_number.as_str().is_empty());

        assert_eq!(verifier.verify("token"), Err(AuthError::MalformedToken));
    }

    #[test]
    fn jwt_requires_org_and_user_claims() {
        let verifier = JwtVerifier::new(jwt_config(None));
        for claims in [
            json!({"user_id": "u"}),
            json!({"org_id": "x", "user_id": "u"}),
            json!({"org_id": "1"}),
            json!({"org_id": "1", "user_id": ""}),
        ] {
            let token = jwt(&claims, "k");
            assert_eq!(verifier.verify(&token), Err(AuthError::MalformedToken), "{claims}");
        }
    }

    #[test]
    fn resolver_tags_identity_with_scheme() {
        let resolver = IdentityResolver::new(&AuthConfig::default());
        let value = xrh(&json!({"identity": {"org_id": "1", "user": {"user_id": "1"}}}));
        let resolved = resolver.resolve(&headers("x-rh-identity", &value)).unwrap();
        assert_eq!(resolved.scheme(), AuthScheme::Xrh);
        assert_eq!(resolved.org_id(), OrgId::new(1));

        let resolver = IdentityResolver::new(&AuthConfig {
            scheme: AuthScheme::Jwt,
            jwt: jwt_config(None),
        });
        let token = jwt(&json!({"org_id": "1", "user_id": "1"}), "k");
        let resolved = resolver
            .resolve(&headers("authorization", &format!("Bearer {token}")))
            .unwrap();
        assert_eq!(resolved.scheme(), AuthScheme::Jwt);
        assert_eq!(resolved.user_id().as_str(), "1");
    }

    #[test]
    fn resolver_ignores_header_of_inactive_scheme() {
        let resolver = IdentityResolver::new(&AuthConfig::default());
        let headers = headers("authorization", "Bearer abc");
        assert_eq!(resolver.resolve(&headers), Err(AuthError::MissingToken));
    }

    #[test]
    fn debug_reports_verification_without_secret() {
        let verifier = JwtVerifier::new(jwt_config(Some("hunter2")));
        let rendered = format!("{verifier:?}");
        assert!(rendered.contains("verifies_signature: true"));
        assert!(!rendered.contains("hunter2"));

        let rendered = format!("{:?}", JwtVerifier::new(jwt_config(None)));
        assert!(rendered.contains("verifies_signature: false"));
    }
}
