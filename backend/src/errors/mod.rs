//! Global error types for the authentication core.
//!
//! Every operation of the authentication service resolves to one of the
//! outcome kinds in [`ErrorKind`]. The routing layer maps those kinds onto
//! transport status codes; the core never does.

use thiserror::Error;

use crate::repositories::StoreError;
use crate::utils::password::{PasswordError, PolicyViolation};

/// Abstract outcome kinds surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Password rejected by the configured policy. User-correctable.
    PolicyViolation,
    /// Identifier already registered. User-correctable.
    Conflict,
    /// Wrong credential or unusable token. Deliberately non-specific.
    AuthFailure,
    /// Identifier failed syntactic validation.
    InvalidInput,
    /// Hashing, signing or persistence failure. Never user-correctable.
    Internal,
}

/// Error returned by every authentication service operation.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Password policy violation: {0}")]
    PolicyViolation(#[from] PolicyViolation),

    #[error("A user with this email {identifier} already exists.")]
    Conflict { identifier: String },

    #[error("Invalid identifier: {message}")]
    InvalidIdentifier { message: String },

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Not authenticated.")]
    Unauthenticated,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn conflict(identifier: impl Into<String>) -> Self {
        Self::Conflict {
            identifier: identifier.into(),
        }
    }

    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The abstract outcome kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::PolicyViolation(_) => ErrorKind::PolicyViolation,
            AuthError::Conflict { .. } => ErrorKind::Conflict,
            AuthError::InvalidIdentifier { .. } => ErrorKind::InvalidInput,
            AuthError::InvalidCredentials | AuthError::Unauthenticated => ErrorKind::AuthFailure,
            AuthError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Message safe to hand back to an end user.
    ///
    /// Internal failures collapse to a generic sentence; their detail is only
    /// available through `Display` for logging.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Internal { .. } => "An internal error occurred.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(error: PasswordError) -> Self {
        AuthError::internal(error.to_string())
    }
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UniqueViolation { identifier } => AuthError::conflict(identifier),
            other => AuthError::internal(other.to_string()),
        }
    }
}
