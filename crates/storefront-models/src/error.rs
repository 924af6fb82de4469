//! Error types for the `storefront-models` crate.
//!
//! All fallible constructors and parsers in this crate return variants of
//! [`ModelError`].

/// Errors produced when constructing or inspecting model types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// An access token was empty or contained only whitespace.
    #[error("access token must not be empty")]
    EmptyToken,

    /// An access token could not be decoded as a JWT.
    #[error("malformed access token: {reason}")]
    MalformedToken {
        /// Human-readable explanation.
        reason: String,
    },

    /// A role string did not name a known role.
    #[error("unknown role \"{value}\"")]
    UnknownRole {
        /// The value that failed to parse.
        value: String,
    },
}
