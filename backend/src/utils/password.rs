//! Password policy, hashing and verification.
//!
//! New hashes are Argon2id PHC strings. Hashes produced by the previous
//! bcrypt scheme still verify, and are reported by
//! [`PasswordHashing::needs_rehash`] so they can be upgraded on next login.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::fmt;
use thiserror::Error;

/// Raw password as typed by the user.
///
/// Lives for a single validate/hash/verify call and never appears in logs.
pub struct PasswordCandidate(SecretString);

impl PasswordCandidate {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(SecretString::from(raw.into()))
    }

    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for PasswordCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordCandidate([REDACTED])")
    }
}

impl From<String> for PasswordCandidate {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for PasswordCandidate {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl<'de> Deserialize<'de> for PasswordCandidate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// The first policy rule a candidate failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("Password must contain at least {min_length} characters.")]
    TooShort { min_length: usize },
    #[error("Password must contain at most {max_length} characters.")]
    TooLong { max_length: usize },
    #[error("Password must contain at least one uppercase letter.")]
    MissingUppercase,
    #[error("Password must contain at least one lowercase letter.")]
    MissingLowercase,
    #[error("Password must contain at least one digit.")]
    MissingDigit,
    #[error("Password must contain at least one special character (a symbol or punctuation mark).")]
    MissingSpecial,
}

/// Password complexity requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

impl PasswordPolicy {
    /// Checks a candidate against the policy.
    ///
    /// Length is counted in characters, not bytes. Returns the first rule the
    /// candidate breaks.
    pub fn validate_strength(&self, candidate: &PasswordCandidate) -> Result<(), PolicyViolation> {
        let password = candidate.expose_secret();
        let length = password.chars().count();

        if length < self.min_length {
            return Err(PolicyViolation::TooShort {
                min_length: self.min_length,
            });
        }

        if length > self.max_length {
            return Err(PolicyViolation::TooLong {
                max_length: self.max_length,
            });
        }

        if self.require_uppercase && !password.chars().any(char::is_uppercase) {
            return Err(PolicyViolation::MissingUppercase);
        }

        if self.require_lowercase && !password.chars().any(char::is_lowercase) {
            return Err(PolicyViolation::MissingLowercase);
        }

        if self.require_digit && !password.chars().any(char::is_numeric) {
            return Err(PolicyViolation::MissingDigit);
        }

        if self.require_special
            && !password
                .chars()
                .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
        {
            return Err(PolicyViolation::MissingSpecial);
        }

        Ok(())
    }
}

/// Failures of the hashing engine itself.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// One-way password hashing.
///
/// Both `hash` and `verify` are deliberately slow; async callers should run
/// them on a blocking thread.
pub trait PasswordHashing: Send + Sync {
    /// Hashes a candidate with a freshly generated salt.
    fn hash(&self, candidate: &PasswordCandidate) -> Result<String, PasswordError>;

    /// Checks a candidate against a stored hash.
    ///
    /// A malformed or unsupported hash verifies as `false`.
    fn verify(&self, candidate: &PasswordCandidate, hash: &str) -> bool;

    /// Whether a stored hash was made by an older algorithm or other costs.
    fn needs_rehash(&self, hash: &str) -> bool;
}

/// Argon2id hasher, the production [`PasswordHashing`] implementation.
#[derive(Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
    params: HashingParams,
}

impl Argon2Hasher {
    pub fn new(params: HashingParams) -> Result<Self, PasswordError> {
        let argon_params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            None,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params),
            params,
        })
    }

    pub fn params(&self) -> HashingParams {
        self.params
    }
}

impl PasswordHashing for Argon2Hasher {
    fn hash(&self, candidate: &PasswordCandidate) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2
            .hash_password(candidate.expose_secret().as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(hash.to_string())
    }

    fn verify(&self, candidate: &PasswordCandidate, hash: &str) -> bool {
        if is_bcrypt_hash(hash) {
            return bcrypt::verify(candidate.expose_secret(), hash).unwrap_or(false);
        }

        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        // Output comparison inside argon2 is constant-time.
        self.argon2
            .verify_password(candidate.expose_secret().as_bytes(), &parsed_hash)
            .is_ok()
    }

    fn needs_rehash(&self, hash: &str) -> bool {
        if is_bcrypt_hash(hash) {
            return true;
        }

        let Ok(parsed) = PasswordHash::new(hash) else {
            return true;
        };

        if parsed.algorithm != argon2::ARGON2ID_IDENT
            || parsed.version != Some(Version::V0x13 as u32)
        {
            return true;
        }

        match Params::try_from(&parsed) {
            Ok(stored) => {
                stored.m_cost() != self.params.memory_kib
                    || stored.t_cost() != self.params.iterations
                    || stored.p_cost() != self.params.parallelism
            }
            Err(_) => true,
        }
    }
}

fn is_bcrypt_hash(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|prefix| hash.starts_with(prefix))
}
