//! Server-context coordinator.
//!
//! A [`ForwardingClient`] is built for one inbound request and dropped with
//! it.  It forwards every cookie the browser sent to the upstream API, so
//! the refresh cookie reaches the issuer without this crate knowing its
//! name, and it has its own refresh gate: concurrent fan-out calls for the
//! same inbound request share one refresh, while different inbound
//! requests never share anything.

use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, AUTHORIZATION, COOKIE};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;
use storefront_models::{parse_cookie_header, AccessToken};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::SdkError;
use crate::pipeline::{Custody, Pipeline};
use crate::request::ApiRequest;

/// Per-request authenticated client for a stateless server.
pub struct ForwardingClient {
    pipeline: Pipeline,
}

impl ForwardingClient {
    /// Rebuild the caller's session from an inbound request's headers.
    ///
    /// Every `Cookie` pair is copied into a fresh cookie jar scoped to the
    /// upstream origin.  An inbound `Authorization: Bearer` header becomes
    /// the initial access token.
    pub fn from_inbound(config: &ClientConfig, inbound: &HeaderMap) -> Result<Self, SdkError> {
        let jar = Jar::default();
        let mut forwarded = 0usize;
        for header in inbound.get_all(COOKIE) {
            let Ok(raw) = header.to_str() else { continue };
            for (name, value) in parse_cookie_header(raw) {
                jar.add_cookie_str(&format!("{name}={value}; Path=/"), config.base_url());
                forwarded += 1;
            }
        }

        let access = inbound
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(AccessToken::from_bearer_header);
        debug!(cookies = forwarded, bearer = access.is_some(), "forwarding inbound session");

        let http = config.http_client(reqwest::Client::builder().cookie_provider(Arc::new(jar)))?;
        Ok(Self {
            pipeline: Pipeline::new(http, config.clone(), Custody::Transient, access),
        })
    }

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

    /// Raw `Set-Cookie` values the issuer returned while refreshing.  The
    /// host should relay them on its own response so the browser drops a
    /// rotated-out refresh cookie.
    pub fn relayed_set_cookies(&self) -> Vec<String> {
        self.pipeline.relayed_set_cookies()
    }

    /// The inbound access token, until a terminal refresh failure drops it.
    /// Refreshed tokens are never stored here.
    pub fn access_token(&self) -> Option<AccessToken> {
        self.pipeline.access_token()
    }

    /// Whether a refresh failed during this request.
    pub fn session_ended(&self) -> bool {
        self.pipeline.session_ended()
    }

    /// Refresh calls issued for this request.
    pub fn refresh_count(&self) -> u64 {
        self.pipeline.refresh_count()
    }
}
