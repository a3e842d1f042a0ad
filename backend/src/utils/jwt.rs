//! JWT token utilities for authentication.
//!
//! Provides token issuance, verification and claims management. Tokens are
//! HMAC-signed with a single configured algorithm; the `alg` header of an
//! incoming token is never used to pick how it is verified.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind as JwtErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

/// Shortest signing secret accepted, in bytes.
pub const MIN_SECRET_BYTES: usize = 32;

/// Algorithms a shared-secret token manager may be configured with.
pub const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// JWT Claims structure carrying the authenticated identity.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// User ID
    #[serde(default)]
    pub sub: String,
    /// Token issued at timestamp
    pub iat: i64,
    /// Token expiration timestamp
    pub exp: i64,
    /// Unique token identifier
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

/// Signed bearer token.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Why a token was refused or could not be minted.
///
/// The verification variants are for logs only; callers outside the core
/// see a single unauthenticated outcome.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is empty")]
    Missing,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token algorithm is not the configured one")]
    AlgorithmMismatch,
    #[error("token has expired")]
    Expired,
    #[error("token is missing required claim `{0}`")]
    MissingClaim(String),
    #[error("signing algorithm {0:?} is not allowed")]
    UnsupportedAlgorithm(Algorithm),
    #[error("signing secret must be at least 32 bytes")]
    WeakSecret,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Source of the current time for issuance and expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock with one-second resolution, for tests.
#[derive(Debug)]
pub struct FixedClock {
    unix_seconds: AtomicI64,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            unix_seconds: AtomicI64::new(at.timestamp()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.unix_seconds.store(at.timestamp(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.unix_seconds.fetch_add(by.num_seconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let seconds = self.unix_seconds.load(Ordering::SeqCst);
        Utc.timestamp_opt(seconds, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Mints and verifies time-bound identity tokens.
pub trait TokenManager: Send + Sync {
    /// Issues a token for `subject`, valid from now until now + `ttl`.
    fn issue(&self, subject: &str, ttl: Duration) -> Result<AccessToken, TokenError>;

    /// Verifies a token and returns its claims.
    ///
    /// Pure in (token, current time, secret): no refresh, no side effects.
    fn verify(&self, token: &str) -> Result<Claims, TokenError>;

    /// Lifetime used when the caller does not choose one.
    fn default_ttl(&self) -> Duration;
}

/// HMAC JWT implementation of [`TokenManager`].
pub struct JwtTokenManager {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl JwtTokenManager {
    /// Creates a token manager bound to one algorithm and secret.
    ///
    /// # Errors
    /// `UnsupportedAlgorithm` for anything outside [`ALLOWED_ALGORITHMS`],
    /// `WeakSecret` for secrets shorter than [`MIN_SECRET_BYTES`].
    pub fn new(
        secret: &SecretString,
        algorithm: Algorithm,
        default_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        if !ALLOWED_ALGORITHMS.contains(&algorithm) {
            return Err(TokenError::UnsupportedAlgorithm(algorithm));
        }

        let secret = secret.expose_secret().as_bytes();
        if secret.len() < MIN_SECRET_BYTES {
            return Err(TokenError::WeakSecret);
        }

        let encoding_key = EncodingKey::from_secret(secret);
        let decoding_key = DecodingKey::from_secret(secret);

        // Expiry is checked against our own clock after decoding.
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(JwtTokenManager {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
            default_ttl,
            clock,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

impl TokenManager for JwtTokenManager {
    fn issue(&self, subject: &str, ttl: Duration) -> Result<AccessToken, TokenError> {
        let now = self.clock.now();
        let exp = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Signing(format!("ttl of {}s overflows the expiry", ttl.num_seconds())))?;

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map(AccessToken)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        if token.trim().is_empty() {
            return Err(TokenError::Missing);
        }

        // Signature and algorithm are checked before claims are deserialized.
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|token_data| token_data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::InvalidSignature => TokenError::BadSignature,
                JwtErrorKind::InvalidAlgorithm => TokenError::AlgorithmMismatch,
                JwtErrorKind::MissingRequiredClaim(claim) => TokenError::MissingClaim(claim.clone()),
                _ => TokenError::Malformed,
            })?;

        if claims.sub.is_empty() {
            return Err(TokenError::MissingClaim("sub".to_string()));
        }

        if claims.iat > claims.exp {
            return Err(TokenError::Malformed);
        }

        if self.clock.now().timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

    pub(crate) const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn manager_with(clock: Arc<FixedClock>) -> JwtTokenManager {
        JwtTokenManager::new(
            &SecretString::from(TEST_SECRET),
            Algorithm::HS256,
            Duration::hours(24),
            clock,
        )
        .unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let clock = Arc::new(FixedClock::new(start()));
        let manager = manager_with(clock);

        let token = manager.issue("user-1", Duration::minutes(30)).unwrap();
        let claims = manager.verify(token.as_str()).unwrap();

        assert_eq!(claims.user_id(), "user-1");
        assert_eq!(claims.iat, start().timestamp());
        assert_eq!(claims.exp, start().timestamp() + 30 * 60);
        assert_eq!(claims.issued_at(), Some(start()));
    }

    #[test]
    fn test_expiry_boundary() {
        let clock = Arc::new(FixedClock::new(start()));
        let manager = manager_with(clock.clone());
        let ttl = Duration::seconds(600);
        let token = manager.issue("user-1", ttl).unwrap();

        clock.set(start() + ttl - Duration::seconds(1));
        assert!(manager.verify(token.as_str()).is_ok());

        clock.set(start() + ttl);
        assert!(manager.verify(token.as_str()).is_ok());

        clock.set(start() + ttl + Duration::seconds(1));
        assert_eq!(manager.verify(token.as_str()), Err(TokenError::Expired));
    }

    #[test]
    fn test_verify_is_repeatable() {
        let clock = Arc::new(FixedClock::new(start()));
        let manager = manager_with(clock);
        let token = manager.issue("user-1", Duration::minutes(5)).unwrap();

        let first = manager.verify(token.as_str());
        let second = manager.verify(token.as_str());
        assert_eq!(first, second);
        assert!(first.is_ok());
    }

    #[test]
    fn test_every_single_bit_flip_is_rejected() {
        let clock = Arc::new(FixedClock::new(start()));
        let manager = manager_with(clock);
        let token = manager.issue("user-1", Duration::minutes(5)).unwrap();
        let bytes = token.as_str().as_bytes();

        let mut checked = 0;
        for index in 0..bytes.len() {
            for bit in 0..8 {
                let mut mutated = bytes.to_vec();
                mutated[index] ^= 1 << bit;
                // Mutations that are not valid UTF-8 cannot be presented as a token.
                let Ok(mutated) = String::from_utf8(mutated) else {
                    continue;
                };
                assert!(
                    manager.verify(&mutated).is_err(),
                    "flip of bit {bit} at byte {index} verified"
                );
                checked += 1;
            }
        }
        assert!(checked > bytes.len() * 6);
    }

    #[test]
    fn test_tampered_payload_fails_signature() {
        let clock = Arc::new(FixedClock::new(start()));
        let manager = manager_with(clock);
        let token = manager.issue("user-1", Duration::minutes(5)).unwrap();

        let parts: Vec<&str> = token.as_str().split('.').collect();
        let payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        let mut claims: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        claims["sub"] = serde_json::Value::String("admin".to_string());
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(manager.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_expired_payload_with_forged_expiry_fails_signature() {
        let clock = Arc::new(FixedClock::new(start()));
        let manager = manager_with(clock.clone());
        let token = manager.issue("user-1", Duration::minutes(5)).unwrap();
        clock.advance(Duration::hours(1));

        let parts: Vec<&str> = token.as_str().split('.').collect();
        let payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        let mut claims: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        claims["exp"] = serde_json::json!(start().timestamp() + 86_400);
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(manager.verify(&forged), Err(TokenError::BadSignature));
        assert_eq!(manager.verify(token.as_str()), Err(TokenError::Expired));
    }

    #[test]
    fn test_rejects_other_hmac_algorithm_with_same_secret() {
        let clock = Arc::new(FixedClock::new(start()));
        let manager = manager_with(clock.clone());

        let hs512 = JwtTokenManager::new(
            &SecretString::from(TEST_SECRET),
            Algorithm::HS512,
            Duration::hours(1),
            clock,
        )
        .unwrap();
        let token = hs512.issue("user-1", Duration::minutes(5)).unwrap();

        assert_eq!(manager.verify(token.as_str()), Err(TokenError::AlgorithmMismatch));
    }

    #[test]
    fn test_rejects_unsigned_token() {
        let clock = Arc::new(FixedClock::new(start()));
        let manager = manager_with(clock);

        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::json!({
                "sub": "user-1",
                "iat": start().timestamp(),
                "exp": start().timestamp() + 300,
                "jti": "x",
            })
            .to_string(),
        );

        assert!(manager.verify(&format!("{header}.{payload}.")).is_err());
        assert!(manager.verify(&format!("{header}.{payload}")).is_err());
    }

    #[test]
    fn test_missing_subject_claim() {
        let clock = Arc::new(FixedClock::new(start()));
        let manager = manager_with(clock);

        #[derive(Serialize)]
        struct NoSubject {
            iat: i64,
            exp: i64,
            jti: String,
        }
        let token = encode(
            &Header::new(Algorithm::HS256),
            &NoSubject {
                iat: start().timestamp(),
                exp: start().timestamp() + 300,
                jti: "x".to_string(),
            },
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            manager.verify(&token),
            Err(TokenError::MissingClaim("sub".to_string()))
        );
    }

    #[test]
    fn test_empty_and_garbage_tokens() {
        let clock = Arc::new(FixedClock::new(start()));
        let manager = manager_with(clock);

        assert_eq!(manager.verify(""), Err(TokenError::Missing));
        assert_eq!(manager.verify("   "), Err(TokenError::Missing));
        assert_eq!(manager.verify("invalid.token.here"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_wrong_secret() {
        let clock = Arc::new(FixedClock::new(start()));
        let manager = manager_with(clock.clone());
        let other = JwtTokenManager::new(
            &SecretString::from("wrong-secret-key-for-testing-minimum-32-chars"),
            Algorithm::HS256,
            Duration::hours(1),
            clock,
        )
        .unwrap();

        let token = other.issue("user-1", Duration::minutes(5)).unwrap();
        assert_eq!(manager.verify(token.as_str()), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_overflowing_ttl_is_an_error() {
        let manager = manager_with(Arc::new(FixedClock::new(start())));

        let result = manager.issue("user-1", Duration::seconds(10_000_000_000_000));
        assert!(matches!(result, Err(TokenError::Signing(_))));
    }

    #[test]
    fn test_constructor_guards() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let weak = JwtTokenManager::new(
            &SecretString::from("short"),
            Algorithm::HS256,
            Duration::hours(1),
            clock.clone(),
        );
        assert!(matches!(weak, Err(TokenError::WeakSecret)));

        let asymmetric = JwtTokenManager::new(
            &SecretString::from(TEST_SECRET),
            Algorithm::RS256,
            Duration::hours(1),
            clock,
        );
        assert!(matches!(
            asymmetric,
            Err(TokenError::UnsupportedAlgorithm(Algorithm::RS256))
        ));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let clock = Arc::new(FixedClock::new(start()));
        let manager = manager_with(clock);
        let token = manager.issue("user-1", Duration::minutes(5)).unwrap();

        assert!(!format!("{:?}", token).contains(token.as_str()));
    }
}
