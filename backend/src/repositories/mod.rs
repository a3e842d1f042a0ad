//! Persistence contract for credentials and its adapters.
//!
//! Writes go through a [`CredentialTransaction`]; nothing it inserts is
//! visible to other readers until `commit`. Dropping an uncommitted
//! transaction rolls it back.

use async_trait::async_trait;
use thiserror::Error;

use crate::database::models::{Credential, NewCredential};

pub mod credential_repository;
pub mod memory;

pub use credential_repository::{SqliteCredentialStore, SqliteCredentialTransaction};
pub use memory::{MemoryCredentialStore, MemoryCredentialTransaction};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Credential already exists: {identifier}")]
    UniqueViolation { identifier: String },

    #[error("Credential not found: {id}")]
    NotFound { id: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[from]
        source: anyhow::Error,
    },
}

impl StoreError {
    pub fn backend(source: impl Into<anyhow::Error>) -> Self {
        Self::Backend {
            source: source.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Lookup and write access to stored credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    type Transaction: CredentialTransaction;

    async fn find_by_identifier(&self, identifier: &str) -> StoreResult<Option<Credential>>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Credential>>;

    /// Opens a write transaction.
    async fn begin(&self) -> StoreResult<Self::Transaction>;

    /// Substitutes the stored hash of an existing credential.
    async fn replace_password_hash(&self, id: &str, password_hash: &str) -> StoreResult<()>;
}

/// Unit of work spanning one registration.
#[async_trait]
pub trait CredentialTransaction: Send {
    /// Inserts a credential, assigning its id.
    ///
    /// Fails with `UniqueViolation` if the identifier is already taken.
    async fn insert_credential(&mut self, credential: NewCredential) -> StoreResult<Credential>;

    /// Publishes every insert made in this transaction.
    async fn commit(self) -> StoreResult<()>;
}
