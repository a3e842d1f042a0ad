//! Credential and session-authentication core.
//!
//! Password policy and Argon2id hashing, HMAC JWT issuance and
//! verification, and an [`AuthService`] that composes them over a
//! [`CredentialStore`]. The HTTP surface lives in the embedding binary.

pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod repositories;
pub mod state;
pub mod utils;

pub use auth::AuthService;
pub use config::Config;
pub use errors::{AuthError, AuthResult, ErrorKind};
pub use repositories::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore};
pub use state::AuthState;
