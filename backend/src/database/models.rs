//! Credential entities as they cross the persistence boundary.
//!
//! The stored password hash is never readable outside this crate. A new
//! credential can only be built from a raw password through
//! [`NewCredential::create`], and a stored one only answers
//! [`Credential::verify_password`].

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::fmt;

use crate::errors::AuthResult;
use crate::utils::password::{PasswordCandidate, PasswordHashing, PasswordPolicy};

/// A registered identity and its password hash.
#[derive(Clone)]
pub struct Credential {
    id: String,
    identifier: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Credential {
    /// Reassembles a credential read from a backing store.
    pub fn from_parts(
        id: String,
        identifier: String,
        password_hash: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            identifier,
            password_hash,
            created_at,
            updated_at,
        }
    }

    /// Stable opaque identity id, the `sub` of issued tokens.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn verify_password(&self, hasher: &dyn PasswordHashing, candidate: &PasswordCandidate) -> bool {
        hasher.verify(candidate, &self.password_hash)
    }

    pub(crate) fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("identifier", &self.identifier)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

/// Persist-ready credential: normalized identifier plus a fresh hash.
#[derive(Clone)]
pub struct NewCredential {
    identifier: String,
    password_hash: String,
}

impl NewCredential {
    /// Validates the candidate against `policy`, then hashes it.
    ///
    /// # Arguments
    /// * `identifier` - Already normalized identifier
    /// * `candidate` - Raw password
    ///
    /// # Errors
    /// `AuthError::PolicyViolation` before any hashing starts, or
    /// `AuthError::Internal` if the hashing engine fails.
    pub fn create(
        identifier: String,
        candidate: &PasswordCandidate,
        policy: &PasswordPolicy,
        hasher: &dyn PasswordHashing,
    ) -> AuthResult<Self> {
        policy.validate_strength(candidate)?;
        let password_hash = hasher.hash(candidate)?;

        Ok(Self {
            identifier,
            password_hash,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Hash to persist. Only storage adapters should read this.
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

impl fmt::Debug for NewCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCredential")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

/// Row shape of the `credentials` table.
#[derive(Debug, FromRow)]
pub(crate) struct CredentialRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CredentialRow> for Credential {
    fn from(row: CredentialRow) -> Self {
        Credential::from_parts(
            row.id,
            row.email,
            row.password_hash,
            row.created_at,
            row.updated_at,
        )
    }
}
