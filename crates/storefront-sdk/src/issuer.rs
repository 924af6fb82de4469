//! Calls to the credential issuer.
//!
//! The issuer is an external service with a fixed contract (see
//! [`AuthEndpoint`]).  Everything here talks to it without going through
//! the recovery pipeline: a failure on an issuer endpoint is final.

use reqwest::header::SET_COOKIE;
use reqwest::Response;
use serde::Serialize;
use storefront_models::{AccessToken, AuthEndpoint, ErrorBody, TokenResponse};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::SdkError;

/// What a refresh call produced.
///
/// `Set-Cookie` values are kept whatever the outcome: a rejected refresh
/// carries the issuer's clearing cookie, which the server context must
/// relay just like a rotated one.
#[derive(Debug)]
pub(crate) struct RefreshOutcome {
    pub token: Result<AccessToken, SdkError>,
    pub set_cookies: Vec<String>,
}

/// `POST /auth/login` or `POST /auth/register`.
pub(crate) async fn exchange<B: Serialize + ?Sized>(
    http: &reqwest::Client,
    config: &ClientConfig,
    endpoint: AuthEndpoint,
    body: &B,
) -> Result<AccessToken, SdkError> {
    let response = http
        .post(config.endpoint(endpoint.path())?)
        .json(body)
        .send()
        .await?;
    let response = error_for_status(endpoint, response).await?;
    read_token(endpoint, response).await
}

/// `POST /auth/refresh`.  The refresh credential travels in the cookie
/// store; no bearer header is sent.
pub(crate) async fn refresh(http: &reqwest::Client, config: &ClientConfig) -> RefreshOutcome {
    let endpoint = AuthEndpoint::Refresh;
    let response = match post(http, config, endpoint).await {
        Ok(response) => response,
        Err(e) => {
            return RefreshOutcome {
                token: Err(e),
                set_cookies: Vec::new(),
            }
        }
    };

    let set_cookies: Vec<String> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(String::from)
        .collect();
    let token = match error_for_status(endpoint, response).await {
        Ok(response) => read_token(endpoint, response).await,
        Err(e) => Err(e),
    };

    debug!(
        granted = token.is_ok(),
        set_cookies = set_cookies.len(),
        "refresh answered"
    );
    RefreshOutcome { token, set_cookies }
}

/// `POST /auth/logout`.
pub(crate) async fn logout(http: &reqwest::Client, config: &ClientConfig) -> Result<(), SdkError> {
    let endpoint = AuthEndpoint::Logout;
    let response = post(http, config, endpoint).await?;
    error_for_status(endpoint, response).await?;
    Ok(())
}

async fn post(
    http: &reqwest::Client,
    config: &ClientConfig,
    endpoint: AuthEndpoint,
) -> Result<Response, SdkError> {
    Ok(http.post(config.endpoint(endpoint.path())?).send().await?)
}

async fn error_for_status(endpoint: AuthEndpoint, response: Response) -> Result<Response, SdkError> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(status_error("POST", endpoint.path(), response).await)
}

async fn read_token(endpoint: AuthEndpoint, response: Response) -> Result<AccessToken, SdkError> {
    let malformed = |reason: String| SdkError::MalformedTokenResponse {
        path: endpoint.path().to_string(),
        reason,
    };
    let body: TokenResponse = response.json().await.map_err(|e| malformed(e.to_string()))?;
    let raw = body
        .access_token
        .ok_or_else(|| malformed("missing `accessToken`".into()))?;
    AccessToken::new(raw).map_err(|e| malformed(e.to_string()))
}

/// Turn a non-success response into [`SdkError::Status`], preferring the
/// `error` field of a JSON body over the raw text.
pub(crate) async fn status_error(method: &str, path: &str, response: Response) -> SdkError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    SdkError::Status {
        method: method.to_string(),
        path: path.to_string(),
        status,
        message,
    }
}
