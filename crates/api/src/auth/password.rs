//! Argon2id password hashing and verification.
//!
//! Hashes use the PHC string format so the algorithm parameters and salt
//! travel with the hash. The work factor comes from [`PasswordConfig`].
//! Hashing is CPU-bound, so the async entry points run it on the blocking
//! thread pool.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::config::{env_or, ConfigError};

/// Plaintext hashed at startup to produce the dummy hash that unknown-user
/// logins are verified against.
const DUMMY_PASSWORD: &str = "catalog-dummy-password";

/// Argon2 work factor.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordConfig {
    /// | Env Var                      | Default |
    /// |------------------------------|---------|
    /// | `PASSWORD_HASH_MEMORY_KIB`   | `19456` |
    /// | `PASSWORD_HASH_ITERATIONS`   | `2`     |
    /// | `PASSWORD_HASH_PARALLELISM`  | `1`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            memory_kib: env_or("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: env_or("PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: env_or("PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordHashError {
    #[error("invalid argon2 parameters: {0}")]
    Params(argon2::Error),

    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),

    #[error("password hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Argon2id hasher with a fixed work factor.
#[derive(Clone, Debug)]
pub struct Argon2Hasher {
    params: Params,
    dummy_hash: Arc<str>,
}

impl Argon2Hasher {
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordHashError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(PasswordHashError::Params)?;
        let mut hasher = Self {
            params,
            dummy_hash: Arc::from(""),
        };
        hasher.dummy_hash = Arc::from(hasher.hash_blocking(DUMMY_PASSWORD)?);
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password with a random salt, returning the PHC string.
    pub fn hash_blocking(&self, password: &str) -> Result<String, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(PasswordHashError::Hash)?;
        Ok(hash.to_string())
    }

    /// Verify a plaintext password against a stored PHC hash.
    ///
    /// Returns `Ok(false)` on mismatch. The digest comparison inside argon2 is
    /// constant-time.
    pub fn verify_blocking(&self, password: &str, hash: &str) -> Result<bool, PasswordHashError> {
        let parsed = PasswordHash::new(hash).map_err(PasswordHashError::Hash)?;
        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordHashError::Hash(e)),
        }
    }

    pub async fn hash(&self, password: String) -> Result<String, PasswordHashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&password)).await?
    }

    pub async fn verify(&self, password: String, hash: String) -> Result<bool, PasswordHashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify_blocking(&password, &hash)).await?
    }

    /// Burn the same verification cost as a real check, for logins that
    /// matched no user. The outcome is always a mismatch.
    pub async fn verify_dummy(&self, password: String) {
        let dummy = self.dummy_hash.to_string();
        if let Err(e) = self.verify(password, dummy).await {
            tracing::warn!(error = %e, "Dummy password verification failed");
        }
    }
}
