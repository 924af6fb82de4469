//! Error types for the mock issuer.
//!
//! [`IssuerError`] implements [`axum::response::IntoResponse`] so handlers
//! can return `Result<…, IssuerError>` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use storefront_models::ErrorBody;

/// Errors that can occur while issuing or checking credentials.
#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    /// Email/password pair did not match a known user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The refresh cookie was missing, unknown, expired or revoked.
    #[error("refresh rejected: {0}")]
    RefreshRejected(String),

    /// The access token was missing, invalid or no longer live.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but the role does not allow the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// An account with that email already exists.
    #[error("account already exists: {0}")]
    Conflict(String),

    /// The endpoint is switched off for fault injection.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Signing an access token failed.
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl IssuerError {
    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::RefreshRejected(_) | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IssuerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        } else {
            tracing::warn!(%status, error = %message, "request rejected");
        }
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
