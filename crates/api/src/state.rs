use std::sync::Arc;

use anyhow::Context;
use catalog_db::store::{CredentialStore, SessionStore};

use crate::auth::jwt::{TokenSigner, TokenVerifier};
use crate::auth::password::Argon2Hasher;
use crate::auth::service::AuthService;
use crate::config::ServerConfig;
use crate::middleware::rate_limit::RateLimiter;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; inner data is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub auth: Arc<AuthService>,
    /// Public-key verifier used by the authentication middleware.
    pub verifier: TokenVerifier,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Assemble the services from configuration and storage backends.
    pub fn new(
        config: ServerConfig,
        users: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> anyhow::Result<Self> {
        let signer = TokenSigner::from_config(&config.jwt).context("loading JWT keys")?;
        let hasher =
            Argon2Hasher::new(&config.password).context("configuring password hashing")?;
        let verifier = signer.verifier();
        let rate_limiter = RateLimiter::new(&config.rate_limit);

        let auth = AuthService::new(users, sessions, signer, hasher, config.jwt.refresh_ttl());

        Ok(Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            verifier,
            rate_limiter,
        })
    }
}
