//! Data structures exchanged with the authentication service.
//!
//! Request payloads carry the raw password as a [`PasswordCandidate`], so
//! it is redacted from `Debug` output and never serialized back out.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::database::models::Credential;
use crate::utils::jwt::AccessToken;
use crate::utils::password::PasswordCandidate;

/// Registration request payload
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: PasswordCandidate,
}

impl RegisterRequest {
    pub fn new(email: impl Into<String>, password: impl Into<PasswordCandidate>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Login request payload
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: PasswordCandidate,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<PasswordCandidate>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Token response returned by register and login
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: AccessToken,
    pub token_type: String,
    pub expires_in: i64, // Token lifetime in seconds
}

impl TokenResponse {
    pub fn bearer(access_token: AccessToken, ttl: Duration) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: ttl.num_seconds(),
        }
    }
}

/// Outcome of a successful registration.
#[derive(Debug)]
pub struct Registered {
    pub credential: Credential,
    pub token: TokenResponse,
}

/// Identity claims carried by a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedIdentity {
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
