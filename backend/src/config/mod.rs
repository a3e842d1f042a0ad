//! Central module for application-wide configuration settings.
//!
//! Loads database, token and password-hashing settings once at process
//! start. The signing secret is kept behind [`SecretString`] and never
//! printed.

use anyhow::{Context, Result, bail};
use jsonwebtoken::Algorithm;
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::str::FromStr;

use crate::utils::jwt::{ALLOWED_ALGORITHMS, MIN_SECRET_BYTES};
use crate::utils::password::{HashingParams, PasswordPolicy};

/// Upper bound for access token lifetime: one year.
pub const MAX_TOKEN_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub jwt_secret: SecretString,
    pub jwt_expires_in_seconds: u64,
    pub jwt_algorithm: Algorithm,
    pub password_policy: PasswordPolicy,
    pub hashing: HashingParams,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL not set")?;

        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 5u32)?;
        let acquire_timeout_seconds = parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECONDS", 3u64)?;

        let jwt_secret = SecretString::from(lookup("JWT_SECRET").context("JWT_SECRET not set")?);
        if jwt_secret.expose_secret().len() < MIN_SECRET_BYTES {
            bail!("JWT_SECRET must be at least {} bytes", MIN_SECRET_BYTES);
        }

        let jwt_expires_in_seconds = parse_or(&lookup, "JWT_EXPIRES_IN_SECONDS", 86400u64)?;
        if jwt_expires_in_seconds == 0 || jwt_expires_in_seconds > MAX_TOKEN_TTL_SECONDS {
            bail!(
                "JWT_EXPIRES_IN_SECONDS must be between 1 and {} seconds",
                MAX_TOKEN_TTL_SECONDS
            );
        }

        let jwt_algorithm = match lookup("JWT_ALGORITHM") {
            Some(raw) => Algorithm::from_str(raw.trim())
                .map_err(|_| anyhow::anyhow!("JWT_ALGORITHM `{}` is not a known algorithm", raw))?,
            None => Algorithm::HS256,
        };
        if !ALLOWED_ALGORITHMS.contains(&jwt_algorithm) {
            bail!("JWT_ALGORITHM must be one of HS256, HS384, HS512");
        }

        let defaults = PasswordPolicy::default();
        let password_policy = PasswordPolicy {
            min_length: parse_or(&lookup, "PASSWORD_MIN_LENGTH", defaults.min_length)?,
            max_length: parse_or(&lookup, "PASSWORD_MAX_LENGTH", defaults.max_length)?,
            require_uppercase: parse_or(&lookup, "PASSWORD_REQUIRE_UPPERCASE", defaults.require_uppercase)?,
            require_lowercase: parse_or(&lookup, "PASSWORD_REQUIRE_LOWERCASE", defaults.require_lowercase)?,
            require_digit: parse_or(&lookup, "PASSWORD_REQUIRE_DIGIT", defaults.require_digit)?,
            require_special: parse_or(&lookup, "PASSWORD_REQUIRE_SPECIAL", defaults.require_special)?,
        };
        if password_policy.min_length > password_policy.max_length {
            bail!("PASSWORD_MIN_LENGTH must not exceed PASSWORD_MAX_LENGTH");
        }

        let default_hashing = HashingParams::default();
        let hashing = HashingParams {
            memory_kib: parse_or(&lookup, "ARGON2_MEMORY_KIB", default_hashing.memory_kib)?,
            iterations: parse_or(&lookup, "ARGON2_ITERATIONS", default_hashing.iterations)?,
            parallelism: parse_or(&lookup, "ARGON2_PARALLELISM", default_hashing.parallelism)?,
        };

        Ok(Config {
            database_url,
            max_connections,
            acquire_timeout_seconds,
            jwt_secret,
            jwt_expires_in_seconds,
            jwt_algorithm,
            password_policy,
            hashing,
        })
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.jwt_expires_in_seconds as i64)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .ok()
            .with_context(|| format!("{} has an invalid value", key)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "sqlite::memory:"), ("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.max_connections, 5);
        assert_eq!(config.acquire_timeout_seconds, 3);
        assert_eq!(config.jwt_expires_in_seconds, 86400);
        assert_eq!(config.jwt_algorithm, Algorithm::HS256);
        assert_eq!(config.password_policy, PasswordPolicy::default());
        assert_eq!(config.hashing, HashingParams::default());
        assert_eq!(config.token_ttl(), chrono::Duration::days(1));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "sqlite://auth.db"),
            ("JWT_SECRET", SECRET),
            ("JWT_EXPIRES_IN_SECONDS", "900"),
            ("JWT_ALGORITHM", "HS512"),
            ("PASSWORD_MIN_LENGTH", "12"),
            ("PASSWORD_REQUIRE_SPECIAL", "false"),
            ("ARGON2_MEMORY_KIB", "65536"),
        ])
        .unwrap();

        assert_eq!(config.jwt_expires_in_seconds, 900);
        assert_eq!(config.jwt_algorithm, Algorithm::HS512);
        assert_eq!(config.password_policy.min_length, 12);
        assert!(!config.password_policy.require_special);
        assert!(config.password_policy.require_digit);
        assert_eq!(config.hashing.memory_kib, 65536);
    }

    #[test]
    fn test_missing_required_values() {
        let error = load(&[("JWT_SECRET", SECRET)]).unwrap_err();
        assert!(error.to_string().contains("DATABASE_URL"));

        let error = load(&[("DATABASE_URL", "sqlite::memory:")]).unwrap_err();
        assert!(error.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_rejects_weak_secret() {
        let error = load(&[("DATABASE_URL", "sqlite::memory:"), ("JWT_SECRET", "short")]).unwrap_err();
        assert!(error.to_string().contains("at least 32 bytes"));
    }

    #[test]
    fn test_rejects_non_hmac_algorithm() {
        for alg in ["RS256", "ES256", "none", "hs256"] {
            let result = load(&[
                ("DATABASE_URL", "sqlite::memory:"),
                ("JWT_SECRET", SECRET),
                ("JWT_ALGORITHM", alg),
            ]);
            assert!(result.is_err(), "{alg} was accepted");
        }
    }

    #[test]
    fn test_rejects_invalid_numbers() {
        let error = load(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("JWT_SECRET", SECRET),
            ("DB_MAX_CONNECTIONS", "many"),
        ])
        .unwrap_err();
        assert!(error.to_string().contains("DB_MAX_CONNECTIONS"));

        let error = load(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("JWT_SECRET", SECRET),
            ("JWT_EXPIRES_IN_SECONDS", "0"),
        ])
        .unwrap_err();
        assert!(error.to_string().contains("JWT_EXPIRES_IN_SECONDS"));
    }

    #[test]
    fn test_token_ttl_is_bounded() {
        let error = load(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("JWT_SECRET", SECRET),
            ("JWT_EXPIRES_IN_SECONDS", "10000000000000"),
        ])
        .unwrap_err();
        assert!(error.to_string().contains("JWT_EXPIRES_IN_SECONDS"));

        let max = MAX_TOKEN_TTL_SECONDS.to_string();
        let config = load(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("JWT_SECRET", SECRET),
            ("JWT_EXPIRES_IN_SECONDS", max.as_str()),
        ])
        .unwrap();
        assert_eq!(config.token_ttl(), chrono::Duration::days(365));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = load(&[("DATABASE_URL", "sqlite::memory:"), ("JWT_SECRET", SECRET)]).unwrap();
        assert!(!format!("{:?}", config).contains(SECRET));
    }
}
