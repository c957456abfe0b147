//! JWT token handling
//!
//! Header and claim peeking happen before any signature check so the
//! orchestrator can pick an authenticator and the service-identity path can
//! resolve its verification key. Nothing read here is trusted until
//! [`verify`] succeeds.

use crate::error::{AuthError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Clock skew tolerated on `exp` and `nbf`, in seconds.
pub const LEEWAY_SECS: u64 = 5;

/// Asymmetric family accepted for service identities.
pub const SERVICE_IDENTITY_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// Symmetric family accepted for end-user tokens.
pub const SHARED_SECRET_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// `aud` may be a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn values(&self) -> Vec<&str> {
        match self {
            Audience::Single(aud) => vec![aud.as_str()],
            Audience::Multiple(auds) => auds.iter().map(String::as_str).collect(),
        }
    }
}

/// Registered claim set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardClaims {
    /// Subject (principal ID)
    #[serde(default)]
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiration (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Not before (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

/// A token whose signature and time claims have been checked.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub raw: String,
    pub header: Header,
    pub claims: StandardClaims,
}

/// Read the header without verifying the signature.
pub fn peek_header(token: &str) -> Result<Header> {
    jsonwebtoken::decode_header(token).map_err(map_jwt_error)
}

/// Read the claim set without verifying the signature.
pub fn peek_claims(token: &str) -> Result<StandardClaims> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(AuthError::TokenMalformed(
                "token must have three segments".to_string(),
            ))
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::TokenMalformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::TokenMalformed(e.to_string()))
}

fn validation_for(algorithms: &[Algorithm]) -> Validation {
    let mut v = Validation::new(algorithms[0]);
    v.algorithms = algorithms.to_vec();
    v.leeway = LEEWAY_SECS;
    v.required_spec_claims = HashSet::new();
    v.validate_exp = true;
    v.validate_nbf = true;
    // Audience is matched by host in the service-identity authenticator.
    v.validate_aud = false;
    v
}

pub fn service_identity_validation() -> Validation {
    validation_for(&SERVICE_IDENTITY_ALGORITHMS)
}

pub fn shared_secret_validation() -> Validation {
    validation_for(&SHARED_SECRET_ALGORITHMS)
}

/// Full verification: signature, algorithm allowlist and time claims.
pub fn verify(token: &str, key: &DecodingKey, validation: &Validation) -> Result<VerifiedToken> {
    let data = decode::<StandardClaims>(token, key, validation).map_err(map_jwt_error)?;
    Ok(VerifiedToken {
        raw: token.to_string(),
        header: data.header,
        claims: data.claims,
    })
}

/// Collapse library errors into the pipeline taxonomy.
///
/// The library's reason is kept on `TokenRejected` for logging only.
pub fn map_jwt_error(err: JwtError) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthError::TokenMalformed(err.to_string())
        }
        ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => {
            AuthError::TokenExpiredOrNotYetValid
        }
        ErrorKind::InvalidAlgorithm => AuthError::InvalidSigningMethod(err.to_string()),
        _ => AuthError::TokenRejected(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, get_current_timestamp, EncodingKey};
    use pretty_assertions::assert_eq;

    const SECRET: &[u8] = b"test";
    const SUBJECT: &str = "2bb6bd99-c27c-48ea-85bc-a8afbc9f35cb";

    fn sign(claims: &StandardClaims, alg: Algorithm) -> String {
        encode(&Header::new(alg), claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn claims() -> StandardClaims {
        StandardClaims {
            sub: SUBJECT.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_peek_claims_without_key() {
        let mut c = claims();
        c.aud = Some(Audience::Single("https://iam.example.net/".to_string()));
        let token = sign(&c, Algorithm::HS256);

        assert_eq!(peek_claims(&token).unwrap(), c);
    }

    #[test]
    fn test_peek_claims_audience_array() {
        let mut c = claims();
        c.aud = Some(Audience::Multiple(vec![
            "https://a.example/".to_string(),
            "https://b.example/".to_string(),
        ]));
        let token = sign(&c, Algorithm::HS256);

        let peeked = peek_claims(&token).unwrap();
        assert_eq!(
            peeked.aud.unwrap().values(),
            vec!["https://a.example/", "https://b.example/"]
        );
    }

    #[test]
    fn test_peek_claims_rejects_garbage() {
        assert!(matches!(
            peek_claims("not-a-token"),
            Err(AuthError::TokenMalformed(_))
        ));
        assert!(matches!(
            peek_claims("a.!!!.c"),
            Err(AuthError::TokenMalformed(_))
        ));
        assert!(matches!(
            peek_claims("a.b.c.d"),
            Err(AuthError::TokenMalformed(_))
        ));
    }

    #[test]
    fn test_peek_header_reads_kid() {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("b0a4c3f1-54a5-4a5b-8d44-3f4b1a8b9c10".to_string());
        let token = encode(&header, &claims(), &EncodingKey::from_secret(SECRET)).unwrap();

        let peeked = peek_header(&token).unwrap();
        assert_eq!(peeked.alg, Algorithm::HS256);
        assert_eq!(
            peeked.kid.as_deref(),
            Some("b0a4c3f1-54a5-4a5b-8d44-3f4b1a8b9c10")
        );
    }

    #[test]
    fn test_peek_header_malformed() {
        assert!(matches!(
            peek_header("garbage"),
            Err(AuthError::TokenMalformed(_))
        ));
    }

    #[test]
    fn test_verify_without_exp() {
        let token = sign(&claims(), Algorithm::HS256);
        let verified = verify(
            &token,
            &DecodingKey::from_secret(SECRET),
            &shared_secret_validation(),
        )
        .unwrap();

        assert_eq!(verified.claims.sub, SUBJECT);
        assert_eq!(verified.raw, token);
    }

    #[test]
    fn test_verify_expired() {
        let mut c = claims();
        c.exp = Some(get_current_timestamp() as i64 - 3600);
        let token = sign(&c, Algorithm::HS256);

        let err = verify(
            &token,
            &DecodingKey::from_secret(SECRET),
            &shared_secret_validation(),
        )
        .unwrap_err();
        assert_eq!(err, AuthError::TokenExpiredOrNotYetValid);
    }

    #[test]
    fn test_verify_not_yet_valid() {
        let mut c = claims();
        c.nbf = Some(get_current_timestamp() as i64 + 3600);
        let token = sign(&c, Algorithm::HS256);

        let err = verify(
            &token,
            &DecodingKey::from_secret(SECRET),
            &shared_secret_validation(),
        )
        .unwrap_err();
        assert_eq!(err, AuthError::TokenExpiredOrNotYetValid);
    }

    #[test]
    fn test_verify_wrong_secret() {
        let token = sign(&claims(), Algorithm::HS256);

        let err = verify(
            &token,
            &DecodingKey::from_secret(b"other"),
            &shared_secret_validation(),
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::TokenRejected(_)));
    }

    #[test]
    fn test_verify_algorithm_outside_family() {
        let token = sign(&claims(), Algorithm::HS256);

        let err = verify(
            &token,
            &DecodingKey::from_secret(SECRET),
            &service_identity_validation(),
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidSigningMethod(_)));
    }

    #[test]
    fn test_validation_profiles() {
        let si = service_identity_validation();
        assert_eq!(si.algorithms, SERVICE_IDENTITY_ALGORITHMS.to_vec());
        assert!(si.required_spec_claims.is_empty());
        assert!(!si.validate_aud);

        let ss = shared_secret_validation();
        assert_eq!(ss.algorithms, SHARED_SECRET_ALGORITHMS.to_vec());
        assert!(ss.validate_nbf);
        assert_eq!(ss.leeway, LEEWAY_SECS);
    }
}
