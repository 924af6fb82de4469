//! # Storefront SDK
//!
//! Authenticated HTTP access to the **storefront** API.
//!
//! The SDK provides:
//!
//! * [`SessionClient`]: long-lived client that keeps the access token in
//!   memory and the refresh cookie in its own cookie store.
//! * [`ForwardingClient`]: per-request client for a stateless server;
//!   rebuilt from the inbound request's cookies every time.
//! * [`ApiRequest`]: re-sendable description of an API call.
//! * [`ClientConfig`]: API base URL and request timeout.
//! * [`SdkError`]: unified error type for all SDK operations.
//!
//! Both clients attach the access token as a bearer header, treat a `401`
//! as credential expiry, and recover with at most one refresh in flight and
//! at most one retry per call.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use storefront_sdk::{ClientConfig, LoginRequest, SessionClient};
//!
//! # async fn run() -> Result<(), storefront_sdk::SdkError> {
//! let client = SessionClient::new(ClientConfig::new("http://localhost:3001")?)?;
//! client
//!     .login(&LoginRequest {
//!         email: "customer@example.com".into(),
//!         password: "customer-pass".into(),
//!     })
//!     .await?;
//!
//! let orders: serde_json::Value = client.get_json("/api/orders").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod forwarding;
pub mod request;
pub mod session;

mod issuer;
mod pipeline;

#[cfg(test)]
mod test_support;

pub use config::ClientConfig;
pub use error::SdkError;
pub use forwarding::ForwardingClient;
pub use request::ApiRequest;
pub use session::SessionClient;

// Re-export the wire types callers hand to the clients.
pub use storefront_models::{AccessClaims, AccessToken, LoginRequest, RegisterRequest, Role};
