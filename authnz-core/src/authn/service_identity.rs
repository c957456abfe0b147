//! Service-identity authentication
//!
//! Checks run cheapest first: algorithm family, `kid` shape, subject shape and
//! audience host are all read from the unverified token, so a token failing
//! any of them never triggers a key fetch.

use super::{AuthMethod, Authenticated, Principal};
use crate::error::{AuthError, Result};
use crate::jwt::{self, StandardClaims, SERVICE_IDENTITY_ALGORITHMS};
use crate::keys::KeyProvider;
use jsonwebtoken::{Header, Validation};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use url::{Host, Url};
use uuid::Uuid;

/// Authenticates service accounts from RS-signed tokens.
///
/// The verification key is fetched per (`sub`, `kid`) from the [`KeyProvider`].
#[derive(Clone)]
pub struct ServiceIdentityAuthenticator {
    audience: String,
    key_provider: Arc<dyn KeyProvider>,
    validation: Validation,
}

impl ServiceIdentityAuthenticator {
    /// `audience` is compared against the host component of the `aud` claim.
    pub fn new(audience: impl Into<String>, key_provider: Arc<dyn KeyProvider>) -> Self {
        Self {
            audience: audience.into(),
            key_provider,
            validation: jwt::service_identity_validation(),
        }
    }

    pub async fn authenticate(&self, token: &str, header: &Header) -> Result<Authenticated> {
        if !SERVICE_IDENTITY_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::InvalidSigningMethod(format!("{:?}", header.alg)));
        }

        let key_id = header
            .kid
            .as_deref()
            .ok_or_else(|| AuthError::InvalidKeyId(String::new()))?;
        Uuid::parse_str(key_id).map_err(|_| AuthError::InvalidKeyId(key_id.to_string()))?;

        let claims = jwt::peek_claims(token)?;
        let principal = Principal::parse(&claims.sub)?;
        self.check_audience(&claims)?;

        let key = self
            .key_provider
            .public_key(principal.as_str(), key_id)
            .await?;
        let verified = jwt::verify(token, &key, &self.validation)?;

        tracing::debug!(
            principal = %principal,
            key_id = %key_id,
            "Service identity verified"
        );

        Ok(Authenticated {
            principal,
            method: AuthMethod::ServiceIdentity,
            token: verified,
        })
    }

    fn check_audience(&self, claims: &StandardClaims) -> Result<()> {
        let values = claims
            .aud
            .as_ref()
            .map(|aud| aud.values())
            .unwrap_or_default();

        let matched = values.iter().any(|aud| self.host_matches(aud));

        if matched {
            Ok(())
        } else {
            Err(AuthError::AudienceMismatch(values.join(",")))
        }
    }

    /// Host of `aud` against the configured audience. Domains compare
    /// case-insensitively; IPv6 hosts compare without brackets.
    fn host_matches(&self, aud: &str) -> bool {
        let Ok(url) = Url::parse(aud) else {
            return false;
        };
        match url.host() {
            Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case(&self.audience),
            Some(Host::Ipv4(addr)) => self.audience.parse::<Ipv4Addr>() == Ok(addr),
            Some(Host::Ipv6(addr)) => {
                let audience = self.audience.trim_start_matches('[').trim_end_matches(']');
                audience.parse::<Ipv6Addr>() == Ok(addr)
            }
            None => false,
        }
    }
}
