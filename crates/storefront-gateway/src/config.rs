//! Gateway configuration.
//!
//! Built from environment variables at startup.  The upstream URL is
//! validated once here so that handlers can clone a ready
//! [`ClientConfig`] per inbound request.

use std::time::Duration;

use storefront_sdk::{ClientConfig, SdkError};

/// Global configuration shared across all handlers.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on (default `3000`).
    pub listen_port: u16,
    /// Base URL of the storefront API and credential issuer.
    pub upstream_url: String,
    /// Timeout applied to every upstream call, refresh included.
    pub upstream_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_port: 3000,
            upstream_url: "http://localhost:3001".to_string(),
            upstream_timeout: Duration::from_secs(10),
        }
    }
}

impl GatewayConfig {
    /// Build the configuration from environment variables.
    ///
    /// | Variable                | Default                 | Description                 |
    /// |-------------------------|-------------------------|-----------------------------|
    /// | `GATEWAY_PORT`          | `3000`                  | HTTP listen port            |
    /// | `UPSTREAM_URL`          | `http://localhost:3001` | Storefront API base URL     |
    /// | `UPSTREAM_TIMEOUT_SECS` | `10`                    | Per-call upstream timeout   |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let listen_port: u16 = std::env::var("GATEWAY_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.listen_port);
        let upstream_url = std::env::var("UPSTREAM_URL").unwrap_or(defaults.upstream_url);
        let upstream_timeout = std::env::var("UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map_or(defaults.upstream_timeout, Duration::from_secs);

        Self {
            listen_port,
            upstream_url,
            upstream_timeout,
        }
    }

    /// Client configuration for calls to the upstream API.
    pub fn client_config(&self) -> Result<ClientConfig, SdkError> {
        Ok(ClientConfig::new(&self.upstream_url)?.with_timeout(self.upstream_timeout))
    }
}
