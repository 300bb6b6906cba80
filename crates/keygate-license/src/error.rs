//! Error types for keygate-license.

use thiserror::Error;

/// Why a license key was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("license key is empty")]
    EmptyKey,

    #[error("license authority unreachable: {0}")]
    AuthorityUnreachable(String),

    #[error("license key was rejected by the authority")]
    AuthorityRejected,

    #[error("malformed response: {0}")]
    ResponseMalformed(String),

    #[error("could not determine network identity: {0}")]
    IdentityLookupFailed(String),

    #[error("license key is already registered to a different network identity")]
    IdentityMismatch,

    #[error("license registry was modified concurrently, validation must be retried")]
    RegistryConflict,

    #[error("validation failed: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationErrorKind {
    EmptyKey,
    AuthorityUnreachable,
    AuthorityRejected,
    ResponseMalformed,
    IdentityLookupFailed,
    IdentityMismatch,
    RegistryConflict,
    ValidationInternalError,
}

impl ValidationError {
    pub fn kind(&self) -> ValidationErrorKind {
        match self {
            Self::EmptyKey => ValidationErrorKind::EmptyKey,
            Self::AuthorityUnreachable(_) => ValidationErrorKind::AuthorityUnreachable,
            Self::AuthorityRejected => ValidationErrorKind::AuthorityRejected,
            Self::ResponseMalformed(_) => ValidationErrorKind::ResponseMalformed,
            Self::IdentityLookupFailed(_) => ValidationErrorKind::IdentityLookupFailed,
            Self::IdentityMismatch => ValidationErrorKind::IdentityMismatch,
            Self::RegistryConflict => ValidationErrorKind::RegistryConflict,
            Self::Internal(_) => ValidationErrorKind::ValidationInternalError,
        }
    }

    /// Only a registry conflict is worth re-running the whole validation for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RegistryConflict)
    }
}

/// Token authority failures. A definite "invalid" answer is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    #[error("{0}")]
    Unreachable(String),

    #[error("{0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("{0}")]
    Unreachable(String),

    #[error("{0}")]
    Malformed(String),
}

/// Registry document store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The expected version no longer matches the stored document.
    #[error("document version is stale")]
    Conflict,

    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("document store returned malformed data: {0}")]
    Malformed(String),
}

impl From<AuthorityError> for ValidationError {
    fn from(e: AuthorityError) -> Self {
        match e {
            AuthorityError::Unreachable(message) => Self::AuthorityUnreachable(message),
            AuthorityError::Malformed(message) => Self::ResponseMalformed(message),
        }
    }
}

impl From<IdentityError> for ValidationError {
    fn from(e: IdentityError) -> Self {
        Self::IdentityLookupFailed(e.to_string())
    }
}

impl From<StoreError> for ValidationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => Self::RegistryConflict,
            StoreError::Malformed(message) => Self::ResponseMalformed(message),
            StoreError::Unavailable(message) => Self::Internal(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidationError>;
