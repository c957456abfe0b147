//! Token authentication
//!
//! Two strategies exist: service identities sign with an RSA key published by
//! the key-distribution endpoint and always name it in the `kid` header, while
//! end-user tokens are HMAC-signed with the shared secret and carry no `kid`.

mod service_identity;
mod shared_secret;

pub use service_identity::ServiceIdentityAuthenticator;
pub use shared_secret::SharedSecretAuthenticator;

use crate::error::{AuthError, Result};
use crate::jwt::VerifiedToken;
use jsonwebtoken::Header;
use std::fmt;
use uuid::Uuid;

/// Authenticated identity, always UUID-formatted
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(String);

impl Principal {
    /// Accepts any UUID text form; other subjects are
    /// [`AuthError::InvalidSubject`].
    pub fn parse(subject: &str) -> Result<Self> {
        Uuid::parse_str(subject).map_err(|_| AuthError::InvalidSubject(subject.to_string()))?;
        Ok(Self(subject.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authentication method used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ServiceIdentity,
    SharedSecret,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::ServiceIdentity => "service_identity",
            AuthMethod::SharedSecret => "shared_secret",
        }
    }
}

/// Outcome of a successful authentication
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub principal: Principal,
    pub method: AuthMethod,
    pub token: VerifiedToken,
}

/// The authenticator chosen for one call.
///
/// Selection looks only at the unverified header: a `kid` picks the
/// service-identity path, its absence picks the shared-secret path.
pub enum Authenticator<'a> {
    ServiceIdentity(&'a ServiceIdentityAuthenticator),
    SharedSecret(&'a SharedSecretAuthenticator),
}

impl<'a> Authenticator<'a> {
    pub fn select(
        header: &Header,
        service_identity: &'a ServiceIdentityAuthenticator,
        shared_secret: &'a SharedSecretAuthenticator,
    ) -> Self {
        if header.kid.is_some() {
            Authenticator::ServiceIdentity(service_identity)
        } else {
            Authenticator::SharedSecret(shared_secret)
        }
    }

    pub fn method(&self) -> AuthMethod {
        match self {
            Authenticator::ServiceIdentity(_) => AuthMethod::ServiceIdentity,
            Authenticator::SharedSecret(_) => AuthMethod::SharedSecret,
        }
    }

    pub async fn authenticate(&self, token: &str, header: &Header) -> Result<Authenticated> {
        match self {
            Authenticator::ServiceIdentity(auth) => auth.authenticate(token, header).await,
            Authenticator::SharedSecret(auth) => auth.authenticate(token, header),
        }
    }
}
