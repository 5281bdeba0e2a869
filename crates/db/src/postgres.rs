//! PostgreSQL-backed implementations of the storage traits.

use async_trait::async_trait;
use catalog_core::types::DbId;

use crate::models::session::{CreateSession, UserSession};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::repositories::{SessionRepo, UserRepo};
use crate::store::{CredentialStore, SessionStore, StoreResult};
use crate::DbPool;

/// [`CredentialStore`] over the `users` table.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: DbPool,
}

impl PgCredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<User>> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(UserRepo::find_by_username(&self.pool, username).await?)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(UserRepo::find_by_email(&self.pool, email).await?)
    }

    async fn create(&self, input: &CreateUser) -> StoreResult<User> {
        Ok(UserRepo::create(&self.pool, input).await?)
    }

    async fn update(&self, id: DbId, input: &UpdateUser) -> StoreResult<Option<User>> {
        Ok(UserRepo::update(&self.pool, id, input).await?)
    }

    async fn soft_delete(&self, id: DbId) -> StoreResult<bool> {
        Ok(UserRepo::soft_delete(&self.pool, id).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(crate::health_check(&self.pool).await?)
    }
}

/// [`SessionStore`] over the `user_sessions` table.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, input: &CreateSession) -> StoreResult<UserSession> {
        Ok(SessionRepo::create(&self.pool, input).await?)
    }

    async fn find_active_by_token_hash(&self, hash: &str) -> StoreResult<Option<UserSession>> {
        Ok(SessionRepo::find_active_by_token_hash(&self.pool, hash).await?)
    }

    async fn claim_active_by_token_hash(&self, hash: &str) -> StoreResult<Option<UserSession>> {
        Ok(SessionRepo::claim_active_by_token_hash(&self.pool, hash).await?)
    }

    async fn revoke(&self, id: DbId) -> StoreResult<bool> {
        Ok(SessionRepo::revoke(&self.pool, id).await?)
    }

    async fn revoke_all_for_user(&self, user_id: DbId) -> StoreResult<u64> {
        Ok(SessionRepo::revoke_all_for_user(&self.pool, user_id).await?)
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        Ok(SessionRepo::delete_expired(&self.pool).await?)
    }
}
