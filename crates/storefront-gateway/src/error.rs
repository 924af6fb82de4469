//! Error types for the storefront gateway.
//!
//! [`GatewayError`] classifies upstream failures and implements
//! [`axum::response::IntoResponse`] so handlers can return
//! `Result<…, GatewayError>` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use storefront_sdk::SdkError;

/// Errors that can occur while serving an inbound request.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The caller's session could not be recovered.
    #[error("not signed in: {0}")]
    Unauthenticated(SdkError),

    /// The upstream API answered with a non-expiry failure.
    #[error("upstream answered {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    /// The upstream API could not be reached or returned an unreadable body.
    #[error("upstream unavailable: {0}")]
    Upstream(SdkError),

    /// The gateway itself is misconfigured.
    #[error("gateway misconfigured: {0}")]
    Internal(SdkError),
}

impl From<SdkError> for GatewayError {
    fn from(err: SdkError) -> Self {
        if err.is_unauthenticated() {
            return Self::Unauthenticated(err);
        }
        match err {
            SdkError::Status {
                status, message, ..
            } => Self::UpstreamStatus { status, message },
            SdkError::Config(_) => Self::Internal(err),
            other => Self::Upstream(other),
        }
    }
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::UpstreamStatus { .. } | Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        } else {
            tracing::info!(%status, error = %message, "request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
