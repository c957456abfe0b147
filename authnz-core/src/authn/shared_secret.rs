//! Shared-secret (HMAC) authentication for end-user tokens

use super::{AuthMethod, Authenticated, Principal};
use crate::error::{AuthError, Result};
use crate::jwt::{self, SHARED_SECRET_ALGORITHMS};
use jsonwebtoken::{DecodingKey, Header, Validation};

/// Authenticates end-user tokens signed with the shared HMAC secret
#[derive(Clone)]
pub struct SharedSecretAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl SharedSecretAuthenticator {
    /// Only HS256/HS384/HS512 are accepted; `exp` and `nbf` are enforced with
    /// [`jwt::LEEWAY_SECS`] of leeway.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: jwt::shared_secret_validation(),
        }
    }

    pub fn authenticate(&self, token: &str, header: &Header) -> Result<Authenticated> {
        if !SHARED_SECRET_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::InvalidSigningMethod(format!("{:?}", header.alg)));
        }

        let verified = jwt::verify(token, &self.key, &self.validation)?;
        let principal = Principal::parse(&verified.claims.sub)?;

        Ok(Authenticated {
            principal,
            method: AuthMethod::SharedSecret,
            token: verified,
        })
    }
}
