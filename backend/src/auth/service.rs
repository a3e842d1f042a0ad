//! Core business logic for the authentication system.
//!
//! Hashing and verification are CPU and memory heavy, so they run on the
//! blocking thread pool. Store lookups and writes are awaited on the async
//! runtime.

use std::sync::Arc;

use tokio::task::{self, JoinError};
use tracing::{debug, error, info, warn};

use crate::auth::models::*;
use crate::database::models::{Credential, NewCredential};
use crate::errors::{AuthError, AuthResult};
use crate::repositories::{CredentialStore, CredentialTransaction};
use crate::utils::identifier::normalize_identifier;
use crate::utils::jwt::{TokenError, TokenManager};
use crate::utils::password::{PasswordCandidate, PasswordHashing, PasswordPolicy};

/// Verified against when the identifier is unknown, so a miss costs the
/// same as a wrong password.
const DECOY_PASSWORD: &str = "decoy-password-never-registered";

/// Authentication service for registration, login and token checks.
pub struct AuthService<S: CredentialStore> {
    store: S,
    policy: PasswordPolicy,
    hasher: Arc<dyn PasswordHashing>,
    tokens: Arc<dyn TokenManager>,
    decoy_hash: Arc<str>,
}

impl<S: CredentialStore> AuthService<S> {
    /// Creates a new AuthService instance.
    ///
    /// # Arguments
    /// * `store` - Persistence collaborator for credentials
    /// * `policy` - Password rules applied on register and password change
    /// * `hasher` - Password hashing engine
    /// * `tokens` - Token manager used to mint and check access tokens
    ///
    /// # Errors
    /// `AuthError::Internal` if the hasher cannot produce the decoy hash.
    pub fn new(
        store: S,
        policy: PasswordPolicy,
        hasher: Arc<dyn PasswordHashing>,
        tokens: Arc<dyn TokenManager>,
    ) -> AuthResult<Self> {
        let decoy_hash = hasher
            .hash(&PasswordCandidate::from(DECOY_PASSWORD))
            .map_err(|e| {
                error!(error = %e, "Failed to compute decoy password hash");
                AuthError::from(e)
            })?;

        Ok(Self {
            store,
            policy,
            hasher,
            tokens,
            decoy_hash: Arc::from(decoy_hash),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a new identity and issues its first token.
    ///
    /// # Errors
    /// Returns `AuthError` for:
    /// - Malformed identifiers (`InvalidIdentifier`)
    /// - Already registered identifiers (`Conflict`), checked before hashing
    /// - Weak passwords (`PolicyViolation`)
    /// - Hashing, signing or storage failures (`Internal`)
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<Registered> {
        let identifier = normalize_identifier(&request.email)?;

        if self.store.find_by_identifier(&identifier).await?.is_some() {
            debug!(identifier = %identifier, "Registration rejected: identifier already taken");
            return Err(AuthError::conflict(identifier));
        }

        let policy = self.policy.clone();
        let hasher = Arc::clone(&self.hasher);
        let candidate = request.password;
        let new_credential = task::spawn_blocking(move || {
            NewCredential::create(identifier, &candidate, &policy, hasher.as_ref())
        })
        .await
        .map_err(blocking_task_failed)??;

        let mut tx = self.store.begin().await?;
        let credential = tx.insert_credential(new_credential).await?;

        // An uncommitted insert is rolled back when `tx` drops on error.
        let token = self.issue_token(credential.id())?;
        tx.commit().await?;

        info!(user_id = %credential.id(), "User registered");
        Ok(Registered { credential, token })
    }

    /// Checks a password and issues a token.
    ///
    /// Unknown identifiers, malformed identifiers and wrong passwords all
    /// fail with the same `InvalidCredentials`.
    pub async fn login(&self, request: LoginRequest) -> AuthResult<TokenResponse> {
        let credential = match normalize_identifier(&request.email) {
            Ok(identifier) => self.store.find_by_identifier(&identifier).await?,
            Err(_) => None,
        };

        let hasher = Arc::clone(&self.hasher);
        let decoy_hash = Arc::clone(&self.decoy_hash);
        let candidate = request.password;
        let (credential, verified, candidate) = task::spawn_blocking(move || {
            let verified = match &credential {
                Some(credential) => credential.verify_password(hasher.as_ref(), &candidate),
                None => {
                    hasher.verify(&candidate, &decoy_hash);
                    false
                }
            };
            (credential, verified, candidate)
        })
        .await
        .map_err(blocking_task_failed)?;

        let credential = match credential {
            Some(credential) if verified => credential,
            Some(credential) => {
                debug!(user_id = %credential.id(), "Login failed: wrong password");
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                debug!("Login failed: unknown identifier");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if self.hasher.needs_rehash(credential.password_hash()) {
            self.upgrade_hash(&credential, candidate).await;
        }

        let token = self.issue_token(credential.id())?;
        info!(user_id = %credential.id(), "User logged in");
        Ok(token)
    }

    /// Verifies a bearer token and returns the identity it carries.
    pub fn authenticate(&self, token: &str) -> AuthResult<AuthenticatedIdentity> {
        let claims = self.tokens.verify(token).map_err(|e| match e {
            TokenError::Signing(message) => {
                error!(error = %message, "Token verification failed unexpectedly");
                AuthError::internal(message)
            }
            reason => {
                debug!(reason = %reason, "Token rejected");
                AuthError::Unauthenticated
            }
        })?;

        let (Some(issued_at), Some(expires_at)) = (claims.issued_at(), claims.expires_at()) else {
            debug!("Token rejected: timestamps out of range");
            return Err(AuthError::Unauthenticated);
        };

        Ok(AuthenticatedIdentity {
            user_id: claims.sub,
            issued_at,
            expires_at,
        })
    }

    /// Replaces the password of the identity behind `token`.
    ///
    /// The current password must verify. The new one goes through the same
    /// policy as registration.
    pub async fn change_password(
        &self,
        token: &str,
        current: PasswordCandidate,
        new: PasswordCandidate,
    ) -> AuthResult<()> {
        let identity = self.authenticate(token)?;

        let credential = self
            .store
            .find_by_id(&identity.user_id)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %identity.user_id, "Token subject has no stored credential");
                AuthError::Unauthenticated
            })?;

        let policy = self.policy.clone();
        let hasher = Arc::clone(&self.hasher);
        let replacement = task::spawn_blocking(move || {
            if !credential.verify_password(hasher.as_ref(), &current) {
                return Err(AuthError::InvalidCredentials);
            }
            NewCredential::create(credential.identifier().to_string(), &new, &policy, hasher.as_ref())
        })
        .await
        .map_err(blocking_task_failed)??;

        self.store
            .replace_password_hash(&identity.user_id, replacement.password_hash())
            .await?;

        info!(user_id = %identity.user_id, "Password changed");
        Ok(())
    }

    fn issue_token(&self, user_id: &str) -> AuthResult<TokenResponse> {
        let ttl = self.tokens.default_ttl();
        let access_token = self.tokens.issue(user_id, ttl).map_err(|e| {
            error!(user_id = %user_id, error = %e, "Failed to issue access token");
            AuthError::internal(format!("Failed to issue access token: {}", e))
        })?;

        Ok(TokenResponse::bearer(access_token, ttl))
    }

    /// Re-hashes with current parameters. Failures are logged, never raised.
    async fn upgrade_hash(&self, credential: &Credential, candidate: PasswordCandidate) {
        let hasher = Arc::clone(&self.hasher);
        let rehashed = task::spawn_blocking(move || hasher.hash(&candidate)).await;

        let password_hash = match rehashed {
            Ok(Ok(password_hash)) => password_hash,
            Ok(Err(e)) => {
                warn!(user_id = %credential.id(), error = %e, "Password rehash failed");
                return;
            }
            Err(e) => {
                warn!(user_id = %credential.id(), error = %e, "Password rehash task failed");
                return;
            }
        };

        match self
            .store
            .replace_password_hash(credential.id(), &password_hash)
            .await
        {
            Ok(()) => info!(user_id = %credential.id(), "Password hash upgraded"),
            Err(e) => warn!(user_id = %credential.id(), error = %e, "Failed to store upgraded hash"),
        }
    }
}

fn blocking_task_failed(error: JoinError) -> AuthError {
    error!(error = %error, "Blocking password task failed");
    AuthError::internal(format!("Blocking task failed: {}", error))
}
