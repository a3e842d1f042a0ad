//! Process-wide wiring of the authentication core.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::auth::AuthService;
use crate::config::Config;
use crate::database::Database;
use crate::repositories::SqliteCredentialStore;
use crate::utils::jwt::{JwtTokenManager, SystemClock};
use crate::utils::password::Argon2Hasher;

/// Everything a request handler needs, built once at startup.
pub struct AuthState {
    database: Database,
    auth: AuthService<SqliteCredentialStore>,
}

impl AuthState {
    /// Connects to the database, applies migrations and builds the service.
    pub async fn initialize(config: &Config) -> Result<Self> {
        let database = Database::new(config).await?;
        database.migrate().await?;

        let hasher = Argon2Hasher::new(config.hashing).context("invalid Argon2 parameters")?;
        let tokens = JwtTokenManager::new(
            &config.jwt_secret,
            config.jwt_algorithm,
            config.token_ttl(),
            Arc::new(SystemClock),
        )
        .context("invalid token signing configuration")?;

        let store = SqliteCredentialStore::new(database.pool().clone());
        let policy = config.password_policy.clone();
        // Builds the decoy hash, which is as slow as any other Argon2 hash.
        let auth = tokio::task::spawn_blocking(move || {
            AuthService::new(store, policy, Arc::new(hasher), Arc::new(tokens))
        })
        .await
        .context("authentication service setup task failed")?
        .context("failed to build authentication service")?;

        info!(algorithm = ?config.jwt_algorithm, "Authentication core initialized");
        Ok(AuthState { database, auth })
    }

    pub fn auth(&self) -> &AuthService<SqliteCredentialStore> {
        &self.auth
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Closes the connection pool.
    pub async fn shutdown(self) {
        self.database.close().await;
    }
}
