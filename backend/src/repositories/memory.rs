//! In-process credential store.
//!
//! Inserts are staged inside the transaction and applied under a single
//! write lock on commit, so readers never observe a half-finished
//! registration.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::{Credential, NewCredential};
use crate::repositories::{CredentialStore, CredentialTransaction, StoreError, StoreResult};

#[derive(Default)]
struct Credentials {
    by_id: HashMap<String, Credential>,
    /// identifier -> id
    ids_by_identifier: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<RwLock<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed credentials.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    type Transaction = MemoryCredentialTransaction;

    async fn find_by_identifier(&self, identifier: &str) -> StoreResult<Option<Credential>> {
        let credentials = self.inner.read().await;
        Ok(credentials
            .ids_by_identifier
            .get(identifier)
            .and_then(|id| credentials.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Credential>> {
        Ok(self.inner.read().await.by_id.get(id).cloned())
    }

    async fn begin(&self) -> StoreResult<Self::Transaction> {
        Ok(MemoryCredentialTransaction {
            inner: self.inner.clone(),
            staged: Vec::new(),
        })
    }

    async fn replace_password_hash(&self, id: &str, password_hash: &str) -> StoreResult<()> {
        let mut credentials = self.inner.write().await;
        let existing = credentials
            .by_id
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        *existing = Credential::from_parts(
            existing.id().to_string(),
            existing.identifier().to_string(),
            password_hash.to_string(),
            existing.created_at(),
            Utc::now(),
        );

        Ok(())
    }
}

/// Staged inserts; discarded if dropped before `commit`.
pub struct MemoryCredentialTransaction {
    inner: Arc<RwLock<Credentials>>,
    staged: Vec<Credential>,
}

#[async_trait]
impl CredentialTransaction for MemoryCredentialTransaction {
    async fn insert_credential(&mut self, credential: NewCredential) -> StoreResult<Credential> {
        let taken = self
            .inner
            .read()
            .await
            .ids_by_identifier
            .contains_key(credential.identifier())
            || self
                .staged
                .iter()
                .any(|staged| staged.identifier() == credential.identifier());

        if taken {
            return Err(StoreError::UniqueViolation {
                identifier: credential.identifier().to_string(),
            });
        }

        let now = Utc::now();
        let created = Credential::from_parts(
            Uuid::now_v7().to_string(),
            credential.identifier().to_string(),
            credential.password_hash().to_string(),
            now,
            now,
        );
        self.staged.push(created.clone());

        Ok(created)
    }

    async fn commit(self) -> StoreResult<()> {
        let mut credentials = self.inner.write().await;

        // Another transaction may have committed the same identifier since
        // our insert; recheck under the write lock.
        if let Some(conflict) = self
            .staged
            .iter()
            .find(|staged| credentials.ids_by_identifier.contains_key(staged.identifier()))
        {
            return Err(StoreError::UniqueViolation {
                identifier: conflict.identifier().to_string(),
            });
        }

        for credential in self.staged {
            credentials
                .ids_by_identifier
                .insert(credential.identifier().to_string(), credential.id().to_string());
            credentials.by_id.insert(credential.id().to_string(), credential);
        }

        Ok(())
    }
}
