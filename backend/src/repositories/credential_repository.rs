//! SQLite repository for credential persistence.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::database::models::{Credential, CredentialRow, NewCredential};
use crate::repositories::{CredentialStore, CredentialTransaction, StoreError, StoreResult};

/// Repository for credential database operations.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    /// Shared SQLite connection pool
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Creates a new SqliteCredentialStore instance.
    ///
    /// # Arguments
    /// * `pool` - SQLite connection pool with the credentials schema applied
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    type Transaction = SqliteCredentialTransaction;

    /// Retrieves a credential by its normalized email.
    async fn find_by_identifier(&self, identifier: &str) -> StoreResult<Option<Credential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, email, password_hash, created_at, updated_at
            FROM credentials WHERE email = ?
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.map(Credential::from))
    }

    /// Retrieves a credential by its unique identifier.
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Credential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, email, password_hash, created_at, updated_at
            FROM credentials WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.map(Credential::from))
    }

    async fn begin(&self) -> StoreResult<Self::Transaction> {
        let tx = self.pool.begin().await.map_err(StoreError::backend)?;
        Ok(SqliteCredentialTransaction { tx })
    }

    async fn replace_password_hash(&self, id: &str, password_hash: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE credentials SET password_hash = ?, updated_at = ? WHERE id = ?",
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }

        Ok(())
    }
}

/// Open SQLite transaction. Rolled back by sqlx when dropped uncommitted.
pub struct SqliteCredentialTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl CredentialTransaction for SqliteCredentialTransaction {
    async fn insert_credential(&mut self, credential: NewCredential) -> StoreResult<Credential> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now();

        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            INSERT INTO credentials (id, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(credential.identifier())
        .bind(credential.password_hash())
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::UniqueViolation {
                identifier: credential.identifier().to_string(),
            },
            other => StoreError::backend(other),
        })?;

        Ok(Credential::from(row))
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await.map_err(StoreError::backend)
    }
}
