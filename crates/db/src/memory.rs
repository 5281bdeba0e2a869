//! In-memory implementations of the storage traits.
//!
//! Intended for tests and local development. Semantics mirror the Postgres
//! backend: uniqueness is case-insensitive and spans soft-deleted users,
//! lookups hide soft-deleted users and inactive sessions, and
//! [`SessionStore::claim_active_by_token_hash`] is atomic under the store's
//! lock.

use std::collections::HashMap;

use async_trait::async_trait;
use catalog_core::types::DbId;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::models::session::{CreateSession, UserSession};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::store::{constraints, CredentialStore, SessionStore, StoreError, StoreResult};

/// In-memory [`CredentialStore`].
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<DbId, User>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unique_violation(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).filter(|u| !u.is_deleted()).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| !u.is_deleted() && u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| !u.is_deleted() && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(&self, input: &CreateUser) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&input.username))
        {
            return Err(unique_violation(constraints::USERS_USERNAME));
        }
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&input.email)) {
            return Err(unique_violation(constraints::USERS_EMAIL));
        }

        let now = Utc::now();
        let user = User {
            id: input.id,
            username: input.username.clone(),
            email: input.email.clone(),
            password_hash: input.password_hash.clone(),
            display_name: input.display_name.clone(),
            role: input.role,
            is_verified: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: DbId, input: &UpdateUser) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        if let Some(email) = &input.email {
            if users
                .values()
                .any(|u| u.id != id && u.email.eq_ignore_ascii_case(email))
            {
                return Err(unique_violation(constraints::USERS_EMAIL));
            }
        }

        let Some(user) = users.get_mut(&id).filter(|u| !u.is_deleted()) else {
            return Ok(None);
        };
        if let Some(email) = &input.email {
            user.email = email.clone();
        }
        if let Some(display_name) = &input.display_name {
            user.display_name = display_name.clone();
        }
        if let Some(password_hash) = &input.password_hash {
            user.password_hash = password_hash.clone();
        }
        if let Some(role) = input.role {
            user.role = role;
        }
        if let Some(is_verified) = input.is_verified {
            user.is_verified = is_verified;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn soft_delete(&self, id: DbId) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) if !user.is_deleted() => {
                user.deleted_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// In-memory [`SessionStore`].
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<DbId, UserSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored session of a user, including revoked and expired ones.
    pub async fn sessions_for_user(&self, user_id: DbId) -> Vec<UserSession> {
        let sessions = self.sessions.lock().await;
        let mut found: Vec<UserSession> = sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|s| s.created_at);
        found
    }

    /// Total number of stored rows, active or not.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, input: &CreateSession) -> StoreResult<UserSession> {
        let mut sessions = self.sessions.lock().await;
        if sessions
            .values()
            .any(|s| s.refresh_token_hash == input.refresh_token_hash)
        {
            return Err(unique_violation(constraints::SESSIONS_TOKEN_HASH));
        }

        let session = UserSession {
            id: input.id,
            user_id: input.user_id,
            refresh_token_hash: input.refresh_token_hash.clone(),
            user_agent: input.user_agent.clone(),
            ip_address: input.ip_address.clone(),
            expires_at: input.expires_at,
            is_revoked: false,
            created_at: Utc::now(),
        };
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_active_by_token_hash(&self, hash: &str) -> StoreResult<Option<UserSession>> {
        let now = Utc::now();
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .values()
            .find(|s| s.refresh_token_hash == hash && s.is_active_at(now))
            .cloned())
    }

    async fn claim_active_by_token_hash(&self, hash: &str) -> StoreResult<Option<UserSession>> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions
            .values_mut()
            .find(|s| s.refresh_token_hash == hash && s.is_active_at(now))
        else {
            return Ok(None);
        };
        session.is_revoked = true;
        Ok(Some(session.clone()))
    }

    async fn revoke(&self, id: DbId) -> StoreResult<bool> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&id) {
            Some(session) if !session.is_revoked => {
                session.is_revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: DbId) -> StoreResult<u64> {
        let mut sessions = self.sessions.lock().await;
        let mut revoked = 0;
        for session in sessions
            .values_mut()
            .filter(|s| s.user_id == user_id && !s.is_revoked)
        {
            session.is_revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use catalog_core::roles::Role;
    use catalog_core::types::new_id;
    use chrono::Duration;

    use super::*;

    fn new_user(username: &str, email: &str) -> CreateUser {
        CreateUser {
            id: new_id(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            display_name: username.to_string(),
            role: Role::Member,
        }
    }

    fn new_session(user_id: DbId, hash: &str, ttl: Duration) -> CreateSession {
        CreateSession {
            id: new_id(),
            user_id,
            refresh_token_hash: hash.to_string(),
            user_agent: Some("test-agent".to_string()),
            ip_address: Some("127.0.0.1".to_string()),
            expires_at: Utc::now() + ttl,
        }
    }

    #[tokio::test]
    async fn username_uniqueness_is_case_insensitive() {
        let store = MemoryCredentialStore::new();
        store.create(&new_user("alice", "alice@x.com")).await.unwrap();

        let err = store
            .create(&new_user("ALICE", "other@x.com"))
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::UniqueViolation { constraint } if constraint == constraints::USERS_USERNAME);
    }

    #[tokio::test]
    async fn soft_deleted_users_are_hidden_but_still_unique() {
        let store = MemoryCredentialStore::new();
        let user = store.create(&new_user("bob", "bob@x.com")).await.unwrap();

        assert!(store.soft_delete(user.id).await.unwrap());
        assert!(!store.soft_delete(user.id).await.unwrap(), "second delete is a no-op");
        assert!(store.find_by_id(user.id).await.unwrap().is_none());
        assert!(store.find_by_username("bob").await.unwrap().is_none());

        let err = store.create(&new_user("bob", "bob2@x.com")).await.unwrap_err();
        assert_matches!(err, StoreError::UniqueViolation { .. });
    }

    #[tokio::test]
    async fn expired_and_revoked_sessions_look_absent() {
        let store = MemorySessionStore::new();
        let user_id = new_id();
        let live = store
            .create(&new_session(user_id, "live", Duration::days(1)))
            .await
            .unwrap();
        store
            .create(&new_session(user_id, "stale", Duration::seconds(-1)))
            .await
            .unwrap();

        assert!(store.find_active_by_token_hash("live").await.unwrap().is_some());
        assert!(store.find_active_by_token_hash("stale").await.unwrap().is_none());
        assert!(store.find_active_by_token_hash("missing").await.unwrap().is_none());

        assert!(store.revoke(live.id).await.unwrap());
        assert!(store.find_active_by_token_hash("live").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_succeeds_exactly_once() {
        let store = Arc::new(MemorySessionStore::new());
        store
            .create(&new_session(new_id(), "contended", Duration::days(1)))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.claim_active_by_token_hash("contended").await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn revoke_all_and_delete_expired() {
        let store = MemorySessionStore::new();
        let user_id = new_id();
        let other_user = new_id();
        store.create(&new_session(user_id, "a", Duration::days(1))).await.unwrap();
        store.create(&new_session(user_id, "b", Duration::days(1))).await.unwrap();
        store.create(&new_session(other_user, "c", Duration::days(1))).await.unwrap();
        store
            .create(&new_session(other_user, "d", Duration::seconds(-5)))
            .await
            .unwrap();

        assert_eq!(store.revoke_all_for_user(user_id).await.unwrap(), 2);
        assert_eq!(store.revoke_all_for_user(user_id).await.unwrap(), 0);
        assert!(store.find_active_by_token_hash("c").await.unwrap().is_some());

        assert_eq!(store.delete_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 3);
    }
}
