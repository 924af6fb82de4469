//! Issuer endpoints, auth bodies and the credential-expiry predicate.
//!
//! All issuer paths used by the storefront **must** be resolved through
//! [`AuthEndpoint`].  Coordinators compare request paths against
//! [`AuthEndpoint::Refresh`] to keep the refresh call out of the recovery
//! loop, so the path has to be defined in exactly one place.
//!
//! # Endpoint layout
//!
//! ```text
//! POST /auth/login      ← body: LoginRequest,    sets refresh cookie
//! POST /auth/register   ← body: RegisterRequest, sets refresh cookie
//! POST /auth/refresh    ← refresh cookie only,   may rotate the cookie
//! POST /auth/logout     ← refresh cookie only,   clears the cookie
//! ```

use serde::{Deserialize, Serialize};

/// Status code an API answers with when the access credential is no longer
/// valid.
pub const CREDENTIAL_EXPIRED_STATUS: u16 = 401;

/// Whether a response status signals an expired access credential.
///
/// Only `401` qualifies.  A `403`, or a `400` whose body complains about
/// authentication, is an ordinary failure and never triggers a refresh.
///
/// ```
/// use storefront_models::is_credential_expiry;
///
/// assert!(is_credential_expiry(401));
/// assert!(!is_credential_expiry(403));
/// ```
pub fn is_credential_expiry(status: u16) -> bool {
    status == CREDENTIAL_EXPIRED_STATUS
}

// ---------------------------------------------------------------------------
// AuthEndpoint
// ---------------------------------------------------------------------------

/// The fixed set of credential-issuer endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEndpoint {
    /// Exchange email + password for a token pair.
    Login,
    /// Create an account and receive a token pair.
    Register,
    /// Exchange the refresh cookie for a new access token.
    Refresh,
    /// Revoke the refresh cookie.
    Logout,
}

impl AuthEndpoint {
    /// Every endpoint, in declaration order.
    pub const ALL: [Self; 4] = [Self::Login, Self::Register, Self::Refresh, Self::Logout];

    /// Path of the endpoint relative to the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/auth/login",
            Self::Register => "/auth/register",
            Self::Refresh => "/auth/refresh",
            Self::Logout => "/auth/logout",
        }
    }

    /// Resolve a request path to an issuer endpoint.
    ///
    /// The query string and a trailing slash are ignored.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = normalize_path(path);
        Self::ALL.into_iter().find(|e| e.path() == path)
    }
}

/// Whether `path` addresses the refresh endpoint.
///
/// ```
/// use storefront_models::is_refresh_path;
///
/// assert!(is_refresh_path("/auth/refresh"));
/// assert!(is_refresh_path("/auth/refresh/?source=boot"));
/// assert!(!is_refresh_path("/api/cart"));
/// ```
pub fn is_refresh_path(path: &str) -> bool {
    AuthEndpoint::from_path(path) == Some(AuthEndpoint::Refresh)
}

fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

// ---------------------------------------------------------------------------
// Request / Response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /auth/login`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Body of `POST /auth/register`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    /// Display name.
    pub name: String,
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Body returned by login, register and refresh.
///
/// The token is optional on the wire so that a malformed issuer response
/// surfaces as a missing token rather than a deserialisation error.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Freshly issued access token.
    #[serde(default)]
    pub access_token: Option<String>,
}

/// JSON error body used by the issuer and the gateway.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
}
