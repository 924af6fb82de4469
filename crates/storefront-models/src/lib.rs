#![deny(missing_docs)]

//! # Storefront Models
//!
//! Session and token model shared by every storefront crate.
//!
//! Nothing in here performs I/O.  The types describe *what* travels on the
//! wire (access tokens, auth request/response bodies, refresh cookies) and
//! the few predicates every coordinator must agree on (which status code
//! signals an expired credential, which path is the refresh endpoint).
//!
//! ## Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`token`] | `AccessToken`, `AccessClaims`, `Role`, `TokenKind` |
//! | [`auth`] | Issuer endpoints, request/response bodies, expiry predicate |
//! | [`cookie`] | Refresh-cookie policy and `Cookie` header parsing |
//! | [`error`] | `ModelError` |

pub mod auth;
pub mod cookie;
pub mod error;
pub mod token;

// Re-export all public types at crate root for convenience.
pub use auth::*;
pub use cookie::*;
pub use error::*;
pub use token::*;
