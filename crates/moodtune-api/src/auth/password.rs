//! Password hashing and verification using Argon2id
//!
//! - Algorithm: Argon2id (memory-hard)
//! - Memory: 64 MB, 3 iterations, 4 lanes by default
//! - Salt: random, embedded in the PHC string
//!
//! Hashing is CPU-bound; the async wrappers run it on the blocking pool.

use std::sync::{Arc, OnceLock};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use thiserror::Error;

/// Hashing failures. A wrong password is `Ok(false)`, never an error.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,

    #[error("Hashing task failed: {0}")]
    TaskFailed(String),
}

/// Argon2 cost parameters
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (lanes, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    /// Minimal cost, for tests only
    #[cfg(any(test, feature = "test-utils"))]
    pub fn fast() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        }
    }

    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(self.memory_cost, self.time_cost, self.parallelism, self.output_len)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Hash a plaintext password into a PHC string
pub fn hash_password_with_config(password: &str, config: &PasswordConfig) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, config.to_params()?);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored PHC hash
///
/// Parameters are read from the hash itself. The final comparison is
/// constant-time inside `argon2`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
    }
}

/// Plaintext behind the placeholder hash; never matches a login attempt
const PLACEHOLDER_PASSWORD: &str = "moodtune-placeholder-credential";

/// Hasher handle shared by the auth service
///
/// Carries a lazily built placeholder hash with the same cost parameters as
/// real credentials, so rejecting an unknown identity costs one full verify.
#[derive(Debug, Clone, Default)]
pub struct PasswordHasherService {
    config: PasswordConfig,
    placeholder: Arc<OnceLock<String>>,
}

impl PasswordHasherService {
    pub fn new(config: PasswordConfig) -> Self {
        Self {
            config,
            placeholder: Arc::default(),
        }
    }

    pub async fn hash(&self, password: String) -> Result<String, PasswordError> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || hash_password_with_config(&password, &config))
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
    }

    pub async fn verify(&self, password: String, hash: String) -> Result<bool, PasswordError> {
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
    }

    /// Run a full verification against the placeholder hash
    ///
    /// The outcome carries no information; callers discard it.
    pub async fn verify_placeholder(&self, password: String) -> Result<bool, PasswordError> {
        let config = self.config.clone();
        let placeholder = self.placeholder.clone();
        tokio::task::spawn_blocking(move || {
            let hash = match placeholder.get() {
                Some(hash) => hash,
                None => {
                    let hash = hash_password_with_config(PLACEHOLDER_PASSWORD, &config)?;
                    placeholder.get_or_init(|| hash)
                }
            };
            verify_password(&password, hash)
        })
        .await
        .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
    }

    #[cfg(test)]
    pub(crate) fn placeholder_hash(&self) -> Option<&str> {
        self.placeholder.get().map(String::as_str)
    }
}
