//! Refresh-token session model and DTOs.

use catalog_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A session row from the `user_sessions` table.
///
/// Only the SHA-256 hash of the refresh secret is stored. Rows are never
/// updated except to set `is_revoked`.
#[derive(Debug, Clone, FromRow)]
pub struct UserSession {
    pub id: DbId,
    pub user_id: DbId,
    pub refresh_token_hash: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: Timestamp,
    pub is_revoked: bool,
    pub created_at: Timestamp,
}

impl UserSession {
    /// Usable for rotation: not revoked and not yet expired at `now`.
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        !self.is_revoked && self.expires_at > now
    }
}

/// DTO for creating a new session. The id is allocated by the caller.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub id: DbId,
    pub user_id: DbId,
    pub refresh_token_hash: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: Timestamp,
}
