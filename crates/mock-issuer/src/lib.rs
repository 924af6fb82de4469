//! Mock credential issuer and demo storefront API.
//!
//! Implements the issuer side of the storefront auth contract entirely in
//! memory: users, refresh sessions keyed by cookie value, HS256 access
//! tokens.  It also serves a few entity endpoints so that coordinators
//! have something to call.
//!
//! [`IssuerState`] exposes hooks for expiring access tokens, revoking
//! sessions and delaying or corrupting refresh responses, which is what
//! the SDK and gateway tests drive.

pub mod config;
pub mod error;
pub mod jwt;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

pub use config::IssuerConfig;
pub use error::IssuerError;
pub use routes::router;
pub use state::{
    IssuerState, SEED_ADMIN_EMAIL, SEED_ADMIN_PASSWORD, SEED_CUSTOMER_EMAIL,
    SEED_CUSTOMER_PASSWORD,
};

/// Serve the issuer on an ephemeral loopback port in the background.
///
/// Returns the bound address.  The server runs until the Tokio runtime
/// shuts down.
pub async fn serve_ephemeral(state: Arc<IssuerState>) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = router(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "mock issuer stopped");
        }
    });
    Ok(addr)
}
