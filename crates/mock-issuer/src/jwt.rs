//! Access token signing and verification.
//!
//! Tokens are HS256 JWTs carrying [`AccessClaims`].  Verification checks
//! the signature and `exp`; whether the token is still *live* (not expired
//! early by the issuer) is decided by the session store.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use storefront_models::{AccessClaims, Role, TokenKind};

use crate::error::IssuerError;

/// Signs and verifies access tokens with a shared secret.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenSigner {
    /// Create a signer with the given HMAC secret and token lifetime.
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::try_seconds(ttl_secs).unwrap_or_else(|| Duration::minutes(15)),
        }
    }

    /// Sign a fresh access token for `sub`.
    pub fn issue(&self, sub: &str, role: Role) -> Result<(String, AccessClaims), IssuerError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: sub.to_string(),
            role,
            kind: TokenKind::Access,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok((token, claims))
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, IssuerError> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| IssuerError::Unauthorized(e.to_string()))?;
        if data.claims.kind != TokenKind::Access {
            return Err(IssuerError::Unauthorized("not an access token".into()));
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let signer = TokenSigner::new(b"secret", 60);
        let (token, claims) = signer.issue("7", Role::Customer).unwrap();
        let verified = signer.verify(&token).unwrap();
        assert_eq!(verified, claims);
        assert_eq!(verified.exp - verified.iat, 60);
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let (token, _) = TokenSigner::new(b"one", 60).issue("7", Role::Customer).unwrap();
        let err = TokenSigner::new(b"two", 60).verify(&token).unwrap_err();
        assert!(matches!(err, IssuerError::Unauthorized(_)));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let signer = TokenSigner::new(b"secret", -10);
        let (token, _) = signer.issue("7", Role::Admin).unwrap();
        assert!(matches!(
            signer.verify(&token),
            Err(IssuerError::Unauthorized(_))
        ));
    }

    #[test]
    fn garbage_is_unauthorized() {
        let signer = TokenSigner::new(b"secret", 60);
        assert!(signer.verify("not-a-jwt").is_err());
    }
}
