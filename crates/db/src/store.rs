//! Storage capability traits.
//!
//! The auth service depends on persistence only through [`CredentialStore`]
//! and [`SessionStore`], so the backend is swappable: [`crate::postgres`] in
//! production, [`crate::memory`] in tests.

use async_trait::async_trait;
use catalog_core::types::DbId;

use crate::models::session::{CreateSession, UserSession};
use crate::models::user::{CreateUser, UpdateUser, User};

/// PostgreSQL SQLSTATE for `unique_violation`.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// Failure reported by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint or index rejected the write.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A non-SQL backend could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) {
                return StoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                };
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Unique index names, shared by every backend so callers can tell which
/// field collided.
pub mod constraints {
    pub const USERS_USERNAME: &str = "uq_users_username";
    pub const USERS_EMAIL: &str = "uq_users_email";
    pub const SESSIONS_TOKEN_HASH: &str = "uq_user_sessions_refresh_token_hash";
}

/// Persistence of user credentials. Soft-deleted users are never returned.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn create(&self, input: &CreateUser) -> StoreResult<User>;

    async fn update(&self, id: DbId, input: &UpdateUser) -> StoreResult<Option<User>>;

    /// Returns `true` if a live user was deleted.
    async fn soft_delete(&self, id: DbId) -> StoreResult<bool>;

    /// Confirm the backend is reachable.
    async fn ping(&self) -> StoreResult<()>;
}

/// Persistence of refresh-token sessions.
///
/// Every lookup treats revoked, expired and absent rows identically.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, input: &CreateSession) -> StoreResult<UserSession>;

    async fn find_active_by_token_hash(&self, hash: &str) -> StoreResult<Option<UserSession>>;

    /// Revoke the active session for `hash` and return it, atomically.
    ///
    /// Concurrent callers presenting the same hash must observe exactly one
    /// `Some`.
    async fn claim_active_by_token_hash(&self, hash: &str) -> StoreResult<Option<UserSession>>;

    /// Returns `true` if the session was active and is now revoked.
    async fn revoke(&self, id: DbId) -> StoreResult<bool>;

    /// Revoke every non-revoked session of a user, returning how many.
    async fn revoke_all_for_user(&self, user_id: DbId) -> StoreResult<u64>;

    /// Remove sessions past their expiry, returning how many.
    async fn delete_expired(&self) -> StoreResult<u64>;
}
