//! Access credentials and the claims they carry.
//!
//! An [`AccessToken`] is an opaque bearer string as far as the request
//! pipeline is concerned.  The issuer happens to mint JWTs, so the claims
//! can be *peeked* for display purposes, but nothing in the pipeline trusts
//! them: freshness is decided by the API answering `401`, never by reading
//! `exp` locally.
//!
//! Refresh credentials deliberately have no type here.  They only ever live
//! in an HTTP cookie store, out of reach of application code.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

// ---------------------------------------------------------------------------
// Role / TokenKind
// ---------------------------------------------------------------------------

/// Role of the authenticated subject.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// A shopper.
    Customer,
    /// A back-office operator.
    Admin,
}

impl FromStr for Role {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" | "user" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(ModelError::UnknownRole {
                value: s.to_string(),
            }),
        }
    }
}

/// Which kind of credential a set of claims belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived bearer credential.
    Access,
    /// Long-lived cookie credential.
    Refresh,
}

// ---------------------------------------------------------------------------
// AccessClaims
// ---------------------------------------------------------------------------

/// Claims embedded in an access token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (user) identifier.
    pub sub: String,
    /// Role of the subject.
    pub role: Role,
    /// Always [`TokenKind::Access`] for tokens handed to the pipeline.
    pub kind: TokenKind,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    /// Unique token identifier.
    pub jti: String,
}

impl AccessClaims {
    /// Expiry as a UTC timestamp, if representable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Whether the claims are past their expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

// ---------------------------------------------------------------------------
// AccessToken
// ---------------------------------------------------------------------------

/// A short-lived bearer credential.
///
/// The inner string is never printed by `Debug`, so tokens can sit inside
/// structs that get logged.
///
/// # Examples
///
/// ```
/// use storefront_models::AccessToken;
///
/// let token = AccessToken::new("abc.def.ghi").unwrap();
/// assert_eq!(token.bearer_value(), "Bearer abc.def.ghi");
/// assert_eq!(format!("{token:?}"), "AccessToken(<redacted>)");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token string.  Leading and trailing whitespace is dropped.
    pub fn new(token: impl Into<String>) -> Result<Self, ModelError> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptyToken);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Return the raw token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for an `Authorization` header.
    pub fn bearer_value(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Parse the value of an `Authorization` header.
    ///
    /// Returns `None` unless the header uses the `Bearer` scheme with a
    /// non-empty token.
    pub fn from_bearer_header(value: &str) -> Option<Self> {
        let (scheme, token) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        Self::new(token).ok()
    }

    /// Decode the JWT payload **without verifying the signature**.
    ///
    /// Only useful for display (who am I, when does this expire).
    pub fn peek_claims(&self) -> Result<AccessClaims, ModelError> {
        let mut parts = self.0.split('.');
        let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => {
                return Err(ModelError::MalformedToken {
                    reason: "expected three dot-separated segments".into(),
                })
            }
        };
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| ModelError::MalformedToken {
                reason: e.to_string(),
            })?;
        serde_json::from_slice(&bytes).map_err(|e| ModelError::MalformedToken {
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

impl FromStr for AccessToken {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
