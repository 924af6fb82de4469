//! Storefront gateway, a stateless server between browsers and the
//! storefront API.
//!
//! For each inbound request the gateway:
//!
//! 1. Rebuilds the caller's session from the inbound cookies (and bearer
//!    header, if any).
//! 2. Fans out to the upstream API, refreshing the access token at most
//!    once if it has expired.
//! 3. Relays rotated refresh cookies back to the browser.

mod config;
mod error;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::GatewayConfig;
use crate::routes::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env();
    let upstream = config
        .client_config()
        .context("invalid upstream configuration")?;
    info!(
        upstream = %upstream.base_url(),
        timeout_secs = config.upstream_timeout.as_secs(),
        "upstream configured"
    );

    let app = router(Arc::new(AppState { upstream }));

    let addr = format!("0.0.0.0:{}", config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(address = %addr, "gateway listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
