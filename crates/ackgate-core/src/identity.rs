//! Authenticated identity primitives.
//!
//! An [`Identity`] is resolved once per request by the authentication layer
//! and is never persisted. The scheme that produced it is carried by
//! [`AuthenticatedIdentity`], so handlers receive a typed value instead of
//! probing an untyped request context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric organization identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(u32);

impl OrgId {
    /// Wraps a raw organization number.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw organization number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a user identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the user identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Legacy account number. May be empty for organizations created after the
/// switch to org-based accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Wraps an account number.
    #[must_use]
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Returns the account number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The org/user/account triple resolved from request authentication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Organization the caller belongs to.
    pub org_id: OrgId,
    /// Caller's user identifier.
    pub user_id: UserId,
    /// Caller's account number.
    pub account_number: AccountNumber,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(org_id: OrgId, user_id: UserId, account_number: AccountNumber) -> Self {
        Self {
            org_id,
            user_id,
            account_number,
        }
    }
}

/// Authentication scheme active for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization: Bearer <jwt>`.
    Jwt,
    /// `x-rh-identity: <base64 JSON>` attached by an upstream gateway.
    #[default]
    Xrh,
}

impl AuthScheme {
    /// Returns the header name carrying credentials for this scheme.
    #[must_use]
    pub const fn header_name(self) -> &'static str {
        match self {
            Self::Jwt => "authorization",
            Self::Xrh => "x-rh-identity",
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jwt => f.write_str("jwt"),
            Self::Xrh => f.write_str("xrh"),
        }
    }
}

/// An identity tagged with the scheme that authenticated it.
///
/// Only the authentication layer constructs this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticatedIdentity {
    /// Resolved from a bearer JWT.
    Bearer(Identity),
    /// Resolved from the identity header.
    IdentityHeader(Identity),
}

impl AuthenticatedIdentity {
    /// Returns the full identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        match self {
            Self::Bearer(identity) | Self::IdentityHeader(identity) => identity,
        }
    }

    /// Returns the caller's organization.
    #[must_use]
    pub fn org_id(&self) -> OrgId {
        self.identity().org_id
    }

    /// Returns the caller's user identifier.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.identity().user_id
    }

    /// Returns the scheme that produced this identity.
    #[must_use]
    pub const fn scheme(&self) -> AuthScheme {
        match self {
            Self::Bearer(_) => AuthScheme::Jwt,
            Self::IdentityHeader(_) => AuthScheme::Xrh,
        }
    }

    /// Consumes the wrapper and returns the identity.
    #[must_use]
    pub fn into_identity(self) -> Identity {
        match self {
            Self::Bearer(identity) | Self::IdentityHeader(identity) => identity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Identity {
        Identity::new(OrgId::new(1), UserId::new("1"), AccountNumber::new("1"))
    }

    #[test]
    fn projections_agree_with_identity() {
        for resolved in [
            AuthenticatedIdentity::Bearer(sample()),
            AuthenticatedIdentity::IdentityHeader(sample()),
        ] {
            assert_eq!(resolved.identity(), &sample());
            assert_eq!(resolved.org_id(), resolved.identity().org_id);
            assert_eq!(resolved.user_id(), &resolved.identity().user_id);
            assert_eq!(resolved.org_id(), OrgId::new(1));
            assert_eq!(resolved.user_id().as_str(), "1");
        }
    }

    #[test]
    fn scheme_follows_variant() {
        assert_eq!(AuthenticatedIdentity::Bearer(sample()).scheme(), AuthScheme::Jwt);
        assert_eq!(
            AuthenticatedIdentity::IdentityHeader(sample()).scheme(),
            AuthScheme::Xrh
        );
    }

    #[test]
    fn scheme_header_names() {
        assert_eq!(AuthScheme::Jwt.header_name(), "authorization");
        assert_eq!(AuthScheme::Xrh.header_name(), "x-rh-identity");
        assert_eq!(AuthScheme::default(), AuthScheme::Xrh);
    }
}
