//! Error taxonomy for the authentication/authorization pipeline

use thiserror::Error;
use tonic::Status;

/// Pipeline-wide result type
pub type Result<T> = std::result::Result<T, AuthError>;

/// Message returned when no usable bearer credential is present.
pub const MISSING_CREDENTIAL_MESSAGE: &str = "Request unauthenticated with bearer";

/// Message returned for expired or not-yet-valid tokens.
pub const TOKEN_TIME_MESSAGE: &str = "Token is either expired or not active yet";

/// Which half of the pipeline an error belongs to.
///
/// Determines the status code used at the RPC boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Authorization,
}

/// Pipeline errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Bearer credential is missing")]
    CredentialMissing,

    #[error("Malformed token: {0}")]
    TokenMalformed(String),

    #[error("Token is either expired or not active yet")]
    TokenExpiredOrNotYetValid,

    #[error("Unexpected signing method: {0}")]
    InvalidSigningMethod(String),

    #[error("Invalid kid: {0}")]
    InvalidKeyId(String),

    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    #[error("Unexpected audience: {0}")]
    AudienceMismatch(String),

    #[error("Couldn't handle this token: {0}")]
    TokenRejected(String),

    #[error("Service account {principal} key {key_id} not found")]
    KeyNotFound { principal: String, key_id: String },

    #[error("Unable to decode public key: {0}")]
    KeyDecode(String),

    #[error("Key provider unavailable: {0}")]
    KeyProviderUnavailable(String),

    #[error("Invalid method {0}")]
    UnknownMethod(String),

    #[error("Unknown principal {0}")]
    UnknownPrincipal(String),

    #[error("Unknown role {0}")]
    UnknownRole(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Permission {permission} is required to perform this operation on account {principal}")]
    PermissionDenied {
        permission: String,
        principal: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::UnknownMethod(_)
            | AuthError::UnknownPrincipal(_)
            | AuthError::UnknownRole(_)
            | AuthError::StoreUnavailable(_)
            | AuthError::PermissionDenied { .. } => ErrorCategory::Authorization,
            _ => ErrorCategory::Authentication,
        }
    }

    /// Stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::CredentialMissing => "credential_missing",
            AuthError::TokenMalformed(_) => "token_malformed",
            AuthError::TokenExpiredOrNotYetValid => "token_expired_or_not_yet_valid",
            AuthError::InvalidSigningMethod(_) => "invalid_signing_method",
            AuthError::InvalidKeyId(_) => "invalid_key_id",
            AuthError::InvalidSubject(_) => "invalid_subject",
            AuthError::AudienceMismatch(_) => "audience_mismatch",
            AuthError::TokenRejected(_) => "token_rejected",
            AuthError::KeyNotFound { .. } => "key_not_found",
            AuthError::KeyDecode(_) => "key_decode_error",
            AuthError::KeyProviderUnavailable(_) => "key_provider_unavailable",
            AuthError::UnknownMethod(_) => "unknown_method",
            AuthError::UnknownPrincipal(_) => "unknown_principal",
            AuthError::UnknownRole(_) => "unknown_role",
            AuthError::StoreUnavailable(_) => "store_unavailable",
            AuthError::PermissionDenied { .. } => "permission_denied",
            AuthError::Internal(_) => "internal",
        }
    }

    /// Lookup gaps and store outages, as opposed to a genuine denial.
    pub fn is_configuration_gap(&self) -> bool {
        matches!(
            self,
            AuthError::UnknownMethod(_)
                | AuthError::UnknownPrincipal(_)
                | AuthError::UnknownRole(_)
                | AuthError::StoreUnavailable(_)
        )
    }
}

impl From<AuthError> for Status {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::CredentialMissing => Status::unauthenticated(MISSING_CREDENTIAL_MESSAGE),
            AuthError::TokenExpiredOrNotYetValid => Status::unauthenticated(TOKEN_TIME_MESSAGE),
            AuthError::PermissionDenied { .. } => Status::permission_denied(err.to_string()),
            _ => match err.category() {
                ErrorCategory::Authentication => Status::unauthenticated("Invalid token"),
                ErrorCategory::Authorization => Status::permission_denied("Permission denied"),
            },
        }
    }
}
