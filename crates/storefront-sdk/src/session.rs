//! Client-context coordinator.
//!
//! [`SessionClient`] is meant to be built once per process and shared
//! (it is cheap to clone).  It keeps the access token in memory and lets
//! the HTTP cookie store carry the refresh cookie, so application code
//! never sees the refresh credential.
//!
//! # Typical usage
//!
//! ```rust,no_run
//! use storefront_models::LoginRequest;
//! use storefront_sdk::{ClientConfig, SessionClient};
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
//! // Expired tokens are refreshed transparently.
//! let cart: serde_json::Value = client.get_json("/api/cart").await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;
use storefront_models::{AccessToken, AuthEndpoint, LoginRequest, RegisterRequest};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::SdkError;
use crate::issuer;
use crate::pipeline::{Custody, Pipeline};
use crate::request::ApiRequest;

/// Authenticated API client for a long-lived process.
///
/// All clones share one access token and one refresh gate: however many
/// calls expire at once, at most one refresh call is in flight.
#[derive(Clone)]
pub struct SessionClient {
    pipeline: Arc<Pipeline>,
}

impl SessionClient {
    /// Build a client with its own cookie store.  Starts unauthenticated.
    pub fn new(config: ClientConfig) -> Result<Self, SdkError> {
        let http = config.http_client(reqwest::Client::builder().cookie_store(true))?;
        Ok(Self {
            pipeline: Arc::new(Pipeline::new(http, config, Custody::Retained, None)),
        })
    }

    // ------------------------------------------------------------------
    // Credential
    // ------------------------------------------------------------------

    /// Overwrite the in-memory access token; `None` means unauthenticated.
    ///
    /// Installing a token re-enables refresh after a session has ended.
    pub fn set_access_token(&self, token: Option<AccessToken>) {
        self.pipeline.set_access_token(token);
    }

    /// The current access token.
    pub fn access_token(&self) -> Option<AccessToken> {
        self.pipeline.access_token()
    }

    /// Whether an access token is held.
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Whether a refresh failed (or [`logout`](Self::logout) ran) since the
    /// last token was installed.  While true, expiries are not recovered.
    pub fn session_ended(&self) -> bool {
        self.pipeline.session_ended()
    }

    /// Refresh calls this client has issued.
    pub fn refresh_count(&self) -> u64 {
        self.pipeline.refresh_count()
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Send a request, refreshing and retrying once on credential expiry.
    pub async fn send(&self, request: ApiRequest) -> Result<Response, SdkError> {
        self.pipeline.send(request).await
    }

    /// `GET path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SdkError> {
        self.pipeline.get_json(path).await
    }

    /// `POST path` with a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, SdkError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.pipeline.post_json(path, body).await
    }

    // ------------------------------------------------------------------
    // Issuer
    // ------------------------------------------------------------------

    /// Log in and keep the returned access token.  The issuer's refresh
    /// cookie lands in this client's cookie store.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AccessToken, SdkError> {
        let token = issuer::exchange(
            self.pipeline.http(),
            self.pipeline.config(),
            AuthEndpoint::Login,
            credentials,
        )
        .await?;
        self.set_access_token(Some(token.clone()));
        info!(email = %credentials.email, "logged in");
        Ok(token)
    }

    /// Register an account and keep the returned access token.
    pub async fn register(&self, account: &RegisterRequest) -> Result<AccessToken, SdkError> {
        let token = issuer::exchange(
            self.pipeline.http(),
            self.pipeline.config(),
            AuthEndpoint::Register,
            account,
        )
        .await?;
        self.set_access_token(Some(token.clone()));
        info!(email = %account.email, "registered");
        Ok(token)
    }

    /// Revoke the refresh cookie and forget the access token.
    ///
    /// Local state is cleared even when the issuer call fails; the error
    /// is still returned.
    pub async fn logout(&self) -> Result<(), SdkError> {
        let result = issuer::logout(self.pipeline.http(), self.pipeline.config()).await;
        self.pipeline.sign_out();
        match &result {
            Ok(()) => info!("logged out"),
            Err(e) => warn!(error = %e, "logout call failed, local session cleared anyway"),
        }
        result
    }
}
