//! Mock issuer configuration.
//!
//! Built from environment variables at startup and stored in
//! [`IssuerState`](crate::IssuerState).

use storefront_models::{RefreshCookiePolicy, SameSite, DEFAULT_REFRESH_COOKIE};

/// Global configuration shared across all handlers.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Port to listen on (default `3001`).
    pub listen_port: u16,
    /// Lifetime of access tokens in seconds.
    pub access_ttl_secs: i64,
    /// HMAC secret used to sign access tokens.
    pub jwt_secret: String,
    /// Refresh cookie attributes; `max_age_secs` is the refresh window.
    pub cookie: RefreshCookiePolicy,
    /// Issue a new refresh cookie on every successful refresh.
    pub rotate_refresh: bool,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            listen_port: 3001,
            access_ttl_secs: 15 * 60,
            jwt_secret: "storefront-dev-secret".to_string(),
            cookie: RefreshCookiePolicy::default(),
            rotate_refresh: true,
        }
    }
}

impl IssuerConfig {
    /// Build the configuration from environment variables.
    ///
    /// | Variable           | Default                 | Description                          |
    /// |--------------------|-------------------------|--------------------------------------|
    /// | `ISSUER_PORT`      | `3001`                  | HTTP listen port                     |
    /// | `ACCESS_TTL_SECS`  | `900`                   | Access token lifetime                |
    /// | `REFRESH_TTL_SECS` | `604800`                | Refresh window (cookie `Max-Age`)    |
    /// | `JWT_SECRET`       | `storefront-dev-secret` | HMAC signing secret                  |
    /// | `COOKIE_SECURE`    | `true`                  | Emit `Secure` on the refresh cookie  |
    /// | `ROTATE_REFRESH`   | `true`                  | Rotate the refresh cookie on refresh |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let listen_port = env_parse("ISSUER_PORT").unwrap_or(defaults.listen_port);
        let access_ttl_secs = env_parse("ACCESS_TTL_SECS").unwrap_or(defaults.access_ttl_secs);
        let refresh_ttl_secs =
            env_parse("REFRESH_TTL_SECS").unwrap_or(defaults.cookie.max_age_secs);
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret);
        let secure = env_parse("COOKIE_SECURE").unwrap_or(true);
        let rotate_refresh = env_parse("ROTATE_REFRESH").unwrap_or(defaults.rotate_refresh);

        Self {
            listen_port,
            access_ttl_secs,
            jwt_secret,
            cookie: RefreshCookiePolicy {
                name: DEFAULT_REFRESH_COOKIE.to_string(),
                path: "/".to_string(),
                same_site: SameSite::Strict,
                secure,
                http_only: true,
                max_age_secs: refresh_ttl_secs,
            },
            rotate_refresh,
        }
    }

    /// Drop the `Secure` attribute so cookies survive plain-HTTP loopback
    /// connections.
    #[must_use]
    pub fn with_insecure_cookies(mut self) -> Self {
        self.cookie.secure = false;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
