//! Credential extraction from call metadata

use crate::error::{AuthError, Result};
use tonic::metadata::MetadataMap;

/// Authorization header name
pub const AUTHORIZATION_HEADER: &str = "authorization";

const BEARER_SCHEME: &str = "bearer";

/// Extract the token from an `authorization: Bearer <token>` entry.
///
/// The scheme is matched case-insensitively. Any other scheme, a missing
/// header or an empty token yields `CredentialMissing`.
pub fn bearer_from_metadata(metadata: &MetadataMap) -> Result<String> {
    let value = metadata
        .get(AUTHORIZATION_HEADER)
        .ok_or(AuthError::CredentialMissing)?
        .to_str()
        .map_err(|_| AuthError::CredentialMissing)?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthError::CredentialMissing)?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(AuthError::CredentialMissing);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::CredentialMissing);
    }
    Ok(token.to_string())
}

/// The call's `:authority`, falling back to the `host` header.
pub fn authority_from_request<B>(request: &http::Request<B>) -> Option<String> {
    request
        .uri()
        .authority()
        .map(|a| a.to_string())
        .or_else(|| {
            request
                .headers()
                .get(http::header::HOST)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
}
