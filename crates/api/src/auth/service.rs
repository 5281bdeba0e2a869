//! Registration, login, refresh-token rotation and session revocation.
//!
//! [`AuthService`] depends on persistence only through the
//! [`CredentialStore`] and [`SessionStore`] traits. Every storage failure is
//! classified into a [`CoreError`] before it leaves this module; raw store
//! errors never reach the caller.

use std::sync::Arc;

use catalog_core::error::CoreError;
use catalog_core::roles::Role;
use catalog_core::types::{new_id, DbId, Timestamp};
use catalog_core::validation::{normalize_email, ChangePasswordInput, LoginInput, RegisterInput};
use catalog_db::models::session::CreateSession;
use catalog_db::models::user::{CreateUser, UpdateUser, User, UserProfile};
use catalog_db::store::{constraints, CredentialStore, SessionStore, StoreError};
use chrono::{Duration, Utc};
use validator::Validate;

use super::jwt::TokenSigner;
use super::password::{Argon2Hasher, PasswordHashError};
use super::refresh_token::{generate_refresh_token, hash_refresh_token};

/// Returned for every login failure, whatever the cause.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Returned for every refresh failure, whatever the cause.
pub const INVALID_REFRESH_TOKEN: &str = "Invalid or expired refresh token";

const ACCOUNT_INACTIVE: &str = "Account is no longer active";

/// Request metadata recorded on each new session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Tokens handed to the client after login or refresh.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Plaintext refresh secret. Never stored.
    pub refresh_token: String,
    pub refresh_expires_at: Timestamp,
}

/// Result of a successful login or refresh.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub tokens: AuthTokens,
    pub user: UserProfile,
}

type AuthResult<T> = Result<T, CoreError>;

fn store_failure(err: StoreError) -> CoreError {
    CoreError::Internal(format!("Credential storage failure: {err}"))
}

fn hashing_failure(err: PasswordHashError) -> CoreError {
    CoreError::Internal(format!("Password hashing failure: {err}"))
}

fn invalid_credentials() -> CoreError {
    CoreError::Unauthorized(INVALID_CREDENTIALS.into())
}

fn invalid_refresh_token() -> CoreError {
    CoreError::Unauthorized(INVALID_REFRESH_TOKEN.into())
}

/// Orchestrates the credential and session flows.
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    signer: TokenSigner,
    hasher: Argon2Hasher,
    refresh_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        signer: TokenSigner,
        hasher: Argon2Hasher,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            signer,
            hasher,
            refresh_ttl,
        }
    }

    /// Create an account at the lowest role.
    ///
    /// Username and email collisions are reported as `Conflict` naming the
    /// field; registration necessarily reveals availability.
    pub async fn register(&self, input: RegisterInput) -> AuthResult<UserProfile> {
        input.validate()?;

        let email = normalize_email(&input.email);
        if self
            .users
            .find_by_username(&input.username)
            .await
            .map_err(store_failure)?
            .is_some()
        {
            return Err(CoreError::Conflict("Username is already taken".into()));
        }
        if self
            .users
            .find_by_email(&email)
            .await
            .map_err(store_failure)?
            .is_some()
        {
            return Err(CoreError::Conflict("Email is already registered".into()));
        }

        let password_hash = self
            .hasher
            .hash(input.password)
            .await
            .map_err(hashing_failure)?;

        let display_name = input
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| input.username.clone());

        let create = CreateUser {
            id: new_id(),
            username: input.username,
            email,
            password_hash,
            display_name,
            role: Role::LOWEST,
        };

        let user = self.users.create(&create).await.map_err(|e| match e {
            // Lost a race with a concurrent registration after the pre-checks.
            StoreError::UniqueViolation { constraint } => {
                if constraint == constraints::USERS_EMAIL {
                    CoreError::Conflict("Email is already registered".into())
                } else {
                    CoreError::Conflict("Username is already taken".into())
                }
            }
            other => store_failure(other),
        })?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(UserProfile::from(&user))
    }

    /// Authenticate by username or email and open a new session.
    ///
    /// Unknown accounts and wrong passwords produce the same error, and an
    /// unknown account still pays for a password verification.
    pub async fn login(&self, input: LoginInput, client: ClientInfo) -> AuthResult<AuthSession> {
        input.validate()?;

        let Some(user) = self.find_login_candidate(&input.login).await? else {
            self.hasher.verify_dummy(input.password).await;
            tracing::warn!(ip = ?client.ip_address, "Login rejected");
            return Err(invalid_credentials());
        };

        let matches = self
            .hasher
            .verify(input.password, user.password_hash.clone())
            .await
            .map_err(hashing_failure)?;
        if !matches {
            tracing::warn!(ip = ?client.ip_address, "Login rejected");
            return Err(invalid_credentials());
        }

        let session = self.open_session(&user, client).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(session)
    }

    /// Exchange a refresh token for a new access/refresh pair.
    ///
    /// The presented session is revoked by an atomic claim before anything
    /// new is issued, so concurrent presentations of one token yield exactly
    /// one success.
    pub async fn refresh(&self, refresh_token: &str, client: ClientInfo) -> AuthResult<AuthSession> {
        if refresh_token.is_empty() {
            return Err(invalid_refresh_token());
        }

        let hash = hash_refresh_token(refresh_token);
        let Some(previous) = self
            .sessions
            .claim_active_by_token_hash(&hash)
            .await
            .map_err(store_failure)?
        else {
            tracing::warn!(ip = ?client.ip_address, "Refresh token rejected");
            return Err(invalid_refresh_token());
        };

        let Some(user) = self
            .users
            .find_by_id(previous.user_id)
            .await
            .map_err(store_failure)?
        else {
            tracing::warn!(user_id = %previous.user_id, "Refresh for inactive account rejected");
            return Err(invalid_refresh_token());
        };

        let session = self.open_session(&user, client).await?;
        tracing::info!(
            user_id = %user.id,
            previous_session = %previous.id,
            "Refresh token rotated"
        );
        Ok(session)
    }

    /// Revoke the session behind `refresh_token`. Unknown, revoked and
    /// expired tokens all count as success.
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        if refresh_token.is_empty() {
            return Ok(());
        }

        let hash = hash_refresh_token(refresh_token);
        match self
            .sessions
            .claim_active_by_token_hash(&hash)
            .await
            .map_err(store_failure)?
        {
            Some(session) => {
                tracing::info!(user_id = %session.user_id, session_id = %session.id, "Session logged out");
            }
            None => tracing::debug!("Logout for inactive session"),
        }
        Ok(())
    }

    /// Revoke every session of a user. Returns how many were active.
    pub async fn revoke_all_sessions(&self, user_id: DbId) -> AuthResult<u64> {
        let revoked = self
            .sessions
            .revoke_all_for_user(user_id)
            .await
            .map_err(store_failure)?;
        tracing::info!(user_id = %user_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    /// Profile of a live account.
    pub async fn current_user(&self, user_id: DbId) -> AuthResult<UserProfile> {
        let user = self.live_user(user_id).await?;
        Ok(UserProfile::from(&user))
    }

    /// Replace the password after checking the current one, then revoke every
    /// session so other devices must log in again.
    pub async fn change_password(
        &self,
        user_id: DbId,
        input: ChangePasswordInput,
    ) -> AuthResult<()> {
        input.validate()?;

        let user = self.live_user(user_id).await?;
        let matches = self
            .hasher
            .verify(input.current_password, user.password_hash.clone())
            .await
            .map_err(hashing_failure)?;
        if !matches {
            tracing::warn!(user_id = %user_id, "Password change rejected");
            return Err(invalid_credentials());
        }

        let password_hash = self
            .hasher
            .hash(input.new_password)
            .await
            .map_err(hashing_failure)?;
        let update = UpdateUser {
            password_hash: Some(password_hash),
            ..Default::default()
        };
        if self
            .users
            .update(user_id, &update)
            .await
            .map_err(store_failure)?
            .is_none()
        {
            return Err(CoreError::Unauthorized(ACCOUNT_INACTIVE.into()));
        }

        let revoked = self.revoke_all_sessions(user_id).await?;
        tracing::info!(user_id = %user_id, revoked, "Password changed");
        Ok(())
    }

    /// Soft-delete an account and revoke all of its sessions.
    pub async fn delete_user(&self, user_id: DbId) -> AuthResult<()> {
        let deleted = self
            .users
            .soft_delete(user_id)
            .await
            .map_err(store_failure)?;
        if !deleted {
            return Err(CoreError::NotFound {
                entity: "user",
                id: user_id,
            });
        }

        let revoked = self.revoke_all_sessions(user_id).await?;
        tracing::info!(user_id = %user_id, revoked, "User deleted");
        Ok(())
    }

    /// Confirm the credential store is reachable.
    pub async fn ping(&self) -> AuthResult<()> {
        self.users.ping().await.map_err(store_failure)
    }

    async fn live_user(&self, user_id: DbId) -> AuthResult<User> {
        self.users
            .find_by_id(user_id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| CoreError::Unauthorized(ACCOUNT_INACTIVE.into()))
    }

    /// Look `login` up as whichever identifier it resembles first, then as
    /// the other.
    async fn find_login_candidate(&self, login: &str) -> AuthResult<Option<User>> {
        let login = login.trim();
        let email = normalize_email(login);

        let found = if login.contains('@') {
            match self.users.find_by_email(&email).await.map_err(store_failure)? {
                Some(user) => Some(user),
                None => self.users.find_by_username(login).await.map_err(store_failure)?,
            }
        } else {
            match self.users.find_by_username(login).await.map_err(store_failure)? {
                Some(user) => Some(user),
                None => self.users.find_by_email(&email).await.map_err(store_failure)?,
            }
        };
        Ok(found)
    }

    /// Sign an access token and persist a fresh refresh session.
    async fn open_session(&self, user: &User, client: ClientInfo) -> AuthResult<AuthSession> {
        let access = self
            .signer
            .issue(user.id, &user.username, user.role)
            .map_err(|e| CoreError::Internal(format!("Token signing failure: {e}")))?;

        let (refresh_token, refresh_hash) = generate_refresh_token();
        let refresh_expires_at = Utc::now() + self.refresh_ttl;

        let session = self
            .sessions
            .create(&CreateSession {
                id: new_id(),
                user_id: user.id,
                refresh_token_hash: refresh_hash,
                user_agent: client.user_agent,
                ip_address: client.ip_address,
                expires_at: refresh_expires_at,
            })
            .await
            .map_err(store_failure)?;
        tracing::debug!(user_id = %user.id, session_id = %session.id, "Session created");

        Ok(AuthSession {
            tokens: AuthTokens {
                access_token: access.token,
                expires_in: access.expires_in_secs,
                refresh_token,
                refresh_expires_at,
            },
            user: UserProfile::from(user),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use catalog_db::memory::{MemoryCredentialStore, MemorySessionStore};

    use super::*;
    use crate::auth::jwt::tests::test_signer;
    use crate::auth::password::tests::fast_config;

    struct Fixture {
        service: Arc<AuthService>,
        users: Arc<MemoryCredentialStore>,
        sessions: Arc<MemorySessionStore>,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(MemoryCredentialStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let service = AuthService::new(
            users.clone(),
            sessions.clone(),
            test_signer(),
            Argon2Hasher::new(&fast_config()).unwrap(),
            Duration::days(30),
        );
        Fixture {
            service: Arc::new(service),
            users,
            sessions,
        }
    }

    fn register_input(username: &str, email: &str) -> RegisterInput {
        RegisterInput {
            username: username.into(),
            email: email.into(),
            password: "pw12345678".into(),
            display_name: None,
        }
    }

    fn login_input(login: &str, password: &str) -> LoginInput {
        LoginInput {
            login: login.into(),
            password: password.into(),
        }
    }

    fn client() -> ClientInfo {
        ClientInfo {
            user_agent: Some("unit-test".into()),
            ip_address: Some("192.0.2.1".into()),
        }
    }

    async fn alice(fx: &Fixture) -> UserProfile {
        fx.service
            .register(register_input("alice", "Alice@X.com"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn register_assigns_lowest_role_and_normalizes() {
        let fx = fixture();
        let profile = alice(&fx).await;

        assert_eq!(profile.role, Role::Member);
        assert_eq!(profile.email, "alice@x.com");
        assert_eq!(profile.display_name, "alice");

        let stored = fx.users.find_by_id(profile.id).await.unwrap().unwrap();
        assert!(stored.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn register_reports_which_field_collides() {
        let fx = fixture();
        alice(&fx).await;

        let err = fx
            .service
            .register(register_input("ALICE", "other@x.com"))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(msg) if msg.contains("Username"));

        let err = fx
            .service
            .register(register_input("alicia", "alice@X.COM"))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(msg) if msg.contains("Email"));
    }

    #[tokio::test]
    async fn register_rejects_invalid_input() {
        let fx = fixture();
        let err = fx
            .service
            .register(register_input("a", "nope"))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[tokio::test]
    async fn login_accepts_username_or_email() {
        let fx = fixture();
        let profile = alice(&fx).await;

        let by_name = fx
            .service
            .login(login_input("alice", "pw12345678"), client())
            .await
            .unwrap();
        assert_eq!(by_name.user.id, profile.id);
        assert_eq!(by_name.tokens.expires_in, 15 * 60);

        let by_email = fx
            .service
            .login(login_input("ALICE@x.com", "pw12345678"), client())
            .await
            .unwrap();
        assert_eq!(by_email.user.id, profile.id);

        let sessions = fx.sessions.sessions_for_user(profile.id).await;
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s.refresh_token_hash.len() == 64));
        assert_eq!(sessions[0].user_agent.as_deref(), Some("unit-test"));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let fx = fixture();
        alice(&fx).await;

        let unknown = fx
            .service
            .login(login_input("nobody", "pw12345678"), client())
            .await
            .unwrap_err();
        let wrong = fx
            .service
            .login(login_input("alice", "wrong-password"), client())
            .await
            .unwrap_err();

        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_matches!(unknown, CoreError::Unauthorized(msg) if msg == INVALID_CREDENTIALS);
        assert_matches!(wrong, CoreError::Unauthorized(msg) if msg == INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn refresh_rotates_and_invalidates_predecessor() {
        let fx = fixture();
        let profile = alice(&fx).await;
        let first = fx
            .service
            .login(login_input("alice", "pw12345678"), client())
            .await
            .unwrap();

        let second = fx
            .service
            .refresh(&first.tokens.refresh_token, client())
            .await
            .unwrap();
        assert_ne!(second.tokens.refresh_token, first.tokens.refresh_token);

        let replay = fx
            .service
            .refresh(&first.tokens.refresh_token, client())
            .await
            .unwrap_err();
        assert_matches!(replay, CoreError::Unauthorized(msg) if msg == INVALID_REFRESH_TOKEN);

        fx.service
            .refresh(&second.tokens.refresh_token, client())
            .await
            .unwrap();

        let sessions = fx.sessions.sessions_for_user(profile.id).await;
        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions.iter().filter(|s| !s.is_revoked).count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refresh_has_exactly_one_winner() {
        let fx = fixture();
        alice(&fx).await;
        let session = fx
            .service
            .login(login_input("alice", "pw12345678"), client())
            .await
            .unwrap();
        let token = session.tokens.refresh_token;

        let a = {
            let service = Arc::clone(&fx.service);
            let token = token.clone();
            tokio::spawn(async move { service.refresh(&token, client()).await })
        };
        let b = {
            let service = Arc::clone(&fx.service);
            let token = token.clone();
            tokio::spawn(async move { service.refresh(&token, client()).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    }

    #[tokio::test]
    async fn revoke_all_invalidates_every_refresh_token() {
        let fx = fixture();
        let profile = alice(&fx).await;

        let mut tokens = Vec::new();
        for _ in 0..3 {
            let s = fx
                .service
                .login(login_input("alice", "pw12345678"), client())
                .await
                .unwrap();
            tokens.push(s.tokens.refresh_token);
        }

        assert_eq!(fx.service.revoke_all_sessions(profile.id).await.unwrap(), 3);
        for token in &tokens {
            assert_matches!(
                fx.service.refresh(token, client()).await,
                Err(CoreError::Unauthorized(_))
            );
        }
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let fx = fixture();
        alice(&fx).await;
        let session = fx
            .service
            .login(login_input("alice", "pw12345678"), client())
            .await
            .unwrap();

        fx.service.logout(&session.tokens.refresh_token).await.unwrap();
        fx.service.logout(&session.tokens.refresh_token).await.unwrap();
        fx.service.logout("never-issued").await.unwrap();

        assert_matches!(
            fx.service.refresh(&session.tokens.refresh_token, client()).await,
            Err(CoreError::Unauthorized(_))
        );
    }

    #[tokio::test]
    async fn deleted_account_cannot_login_or_refresh() {
        let fx = fixture();
        let profile = alice(&fx).await;
        let session = fx
            .service
            .login(login_input("alice", "pw12345678"), client())
            .await
            .unwrap();

        fx.service.delete_user(profile.id).await.unwrap();

        assert_matches!(
            fx.service
                .login(login_input("alice", "pw12345678"), client())
                .await,
            Err(CoreError::Unauthorized(msg)) if msg == INVALID_CREDENTIALS
        );
        assert_matches!(
            fx.service.refresh(&session.tokens.refresh_token, client()).await,
            Err(CoreError::Unauthorized(_))
        );
        assert_matches!(
            fx.service.current_user(profile.id).await,
            Err(CoreError::Unauthorized(_))
        );
        assert_matches!(
            fx.service.delete_user(profile.id).await,
            Err(CoreError::NotFound { entity: "user", .. })
        );
    }

    #[tokio::test]
    async fn refresh_of_soft_deleted_user_without_revocation_fails() {
        let fx = fixture();
        let profile = alice(&fx).await;
        let session = fx
            .service
            .login(login_input("alice", "pw12345678"), client())
            .await
            .unwrap();

        // Delete behind the service's back so the session stays active.
        fx.users.soft_delete(profile.id).await.unwrap();

        assert_matches!(
            fx.service.refresh(&session.tokens.refresh_token, client()).await,
            Err(CoreError::Unauthorized(msg)) if msg == INVALID_REFRESH_TOKEN
        );
    }

    #[tokio::test]
    async fn change_password_checks_current_and_revokes_sessions() {
        let fx = fixture();
        let profile = alice(&fx).await;
        let session = fx
            .service
            .login(login_input("alice", "pw12345678"), client())
            .await
            .unwrap();

        let err = fx
            .service
            .change_password(
                profile.id,
                ChangePasswordInput {
                    current_password: "not-my-password".into(),
                    new_password: "new-password-1".into(),
                },
            )
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Unauthorized(_));

        fx.service
            .change_password(
                profile.id,
                ChangePasswordInput {
                    current_password: "pw12345678".into(),
                    new_password: "new-password-1".into(),
                },
            )
            .await
            .unwrap();

        assert_matches!(
            fx.service.refresh(&session.tokens.refresh_token, client()).await,
            Err(CoreError::Unauthorized(_))
        );
        assert_matches!(
            fx.service
                .login(login_input("alice", "pw12345678"), client())
                .await,
            Err(CoreError::Unauthorized(_))
        );
        fx.service
            .login(login_input("alice", "new-password-1"), client())
            .await
            .unwrap();
    }
}
