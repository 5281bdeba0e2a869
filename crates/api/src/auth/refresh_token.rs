//! Opaque refresh secrets.
//!
//! A refresh token is a random alphanumeric string with no internal
//! structure. Only its SHA-256 digest is persisted, so a database leak does
//! not compromise active sessions.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of a generated refresh secret (about 285 bits of entropy).
pub const REFRESH_TOKEN_LEN: usize = 48;

/// Generate a refresh secret.
///
/// Returns `(plaintext, sha256_hex_hash)`. The plaintext goes to the client;
/// only the hash is stored.
pub fn generate_refresh_token() -> (String, String) {
    let plaintext: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(REFRESH_TOKEN_LEN)
        .map(char::from)
        .collect();
    let hash = hash_refresh_token(&plaintext);
    (plaintext, hash)
}

/// Compute the SHA-256 hex digest used to look up a presented refresh token.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
