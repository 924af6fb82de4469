//! Mock issuer binary.

use std::sync::Arc;

use anyhow::Context;
use mock_issuer::{router, IssuerConfig, IssuerState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = IssuerConfig::from_env();
    info!(
        access_ttl_secs = config.access_ttl_secs,
        refresh_ttl_secs = config.cookie.max_age_secs,
        rotate_refresh = config.rotate_refresh,
        cookie_secure = config.cookie.secure,
        "issuer configured"
    );

    let listen_port = config.listen_port;
    let app = router(Arc::new(IssuerState::new(config)));

    let addr = format!("0.0.0.0:{listen_port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(address = %addr, "mock issuer listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
