//! SDK error types.
//!
//! [`SdkError`] is the single error type returned by every fallible
//! operation in the SDK.  The three authentication outcomes are kept
//! apart so callers can tell them from ordinary failures:
//!
//! * [`SdkError::Status`]: the API answered with a non-expiry error status.
//!   Returned untouched, never triggers a refresh.
//! * [`SdkError::Expired`]: the access credential was rejected and no
//!   recovery was attempted (refresh endpoint, already retried, or the
//!   session has already ended).
//! * [`SdkError::SessionEnded`]: a refresh was attempted and failed.

/// Error type for all SDK operations.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Invalid or missing configuration (e.g. bad URL, bad header value).
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization / deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The API answered with a status that does not signal credential
    /// expiry.
    #[error("{method} {path} failed with status {status}: {message}")]
    Status {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
        /// Response status code.
        status: u16,
        /// Error message from the response body, if any.
        message: String,
    },

    /// The access credential was rejected and will not be refreshed for
    /// this call.
    #[error("access credential rejected for {path}")]
    Expired {
        /// Request path.
        path: String,
    },

    /// The refresh call failed; the session is over until the next login.
    #[error("session ended: {0}")]
    SessionEnded(#[source] Box<SdkError>),

    /// An issuer endpoint answered 2xx without a usable access token.
    #[error("{path} returned no usable access token: {reason}")]
    MalformedTokenResponse {
        /// Issuer endpoint path.
        path: String,
        /// What was wrong with the body.
        reason: String,
    },
}

impl SdkError {
    /// Whether the error means the caller is (now) signed out.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Expired { .. } | Self::SessionEnded(_))
    }

    /// HTTP status behind the error, if there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Expired { .. } | Self::SessionEnded(_) => Some(401),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        let err = SdkError::Status {
            method: "GET".into(),
            path: "/api/admin/dashboard".into(),
            status: 403,
            message: "forbidden: admin only".into(),
        };
        assert_eq!(
            err.to_string(),
            "GET /api/admin/dashboard failed with status 403: forbidden: admin only"
        );
        assert!(!err.is_unauthenticated());
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn session_ended_wraps_cause() {
        let cause = SdkError::MalformedTokenResponse {
            path: "/auth/refresh".into(),
            reason: "missing accessToken".into(),
        };
        let err = SdkError::SessionEnded(Box::new(cause));
        assert_eq!(
            err.to_string(),
            "session ended: /auth/refresh returned no usable access token: missing accessToken"
        );
        assert!(err.is_unauthenticated());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn expired_is_unauthenticated() {
        let err = SdkError::Expired {
            path: "/api/cart".into(),
        };
        assert!(err.is_unauthenticated());
        assert_eq!(err.status(), Some(401));
    }
}
