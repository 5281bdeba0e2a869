//! EdDSA access-token issuance and verification.
//!
//! Access tokens are Ed25519-signed JWTs. Signing needs the private key and
//! lives in [`TokenSigner`]; verification needs only the public key and lives
//! in [`TokenVerifier`], which can be handed to any component that gates
//! requests without exposing signing material.

use std::fmt;

use catalog_core::roles::Role;
use catalog_core::types::DbId;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{env_or, env_required, ConfigError};

/// Claims carried by every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
struct Claims {
    /// Subject -- the user's id.
    sub: DbId,
    username: String,
    role: Role,
    iss: String,
    /// Issued-at (UTC Unix timestamp).
    iat: i64,
    /// Expiration (UTC Unix timestamp).
    exp: i64,
    /// Unique token identifier for audit.
    jti: String,
}

/// Decoded contents of a verified access token.
///
/// Inserted into request extensions by the authentication middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthClaims {
    pub user_id: DbId,
    pub username: String,
    pub role: Role,
    /// Expiration (UTC Unix timestamp).
    pub expires_at: i64,
}

impl Claims {
    fn into_auth_claims(self) -> AuthClaims {
        AuthClaims {
            user_id: self.sub,
            username: self.username,
            role: self.role,
            expires_at: self.exp,
        }
    }
}

/// A freshly signed access token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Lifetime in seconds from issuance.
    pub expires_in_secs: i64,
}

/// Verification failure. Every cause (malformed, expired, wrong issuer, bad
/// signature, unsupported algorithm) collapses into this one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid or expired token")]
pub struct InvalidToken;

/// Configuration for token signing and session lifetimes.
#[derive(Clone)]
pub struct JwtConfig {
    /// PKCS#8 PEM of the Ed25519 private key.
    pub private_key_pem: String,
    /// SPKI PEM of the Ed25519 public key.
    pub public_key_pem: String,
    /// Value of the `iss` claim, enforced on verification.
    pub issuer: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Refresh session lifetime in days (default: 30).
    pub refresh_token_expiry_days: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("private_key_pem", &"[redacted]")
            .field("issuer", &self.issuer)
            .field("access_token_expiry_mins", &self.access_token_expiry_mins)
            .field("refresh_token_expiry_days", &self.refresh_token_expiry_days)
            .finish()
    }
}

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default refresh session expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 30;
const DEFAULT_ISSUER: &str = "catalog-api";

fn read_key_file(key: &'static str) -> Result<String, ConfigError> {
    let path = env_required(key)?;
    std::fs::read_to_string(&path).map_err(|source| ConfigError::KeyFile { key, path, source })
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                   | Required | Default       |
    /// |---------------------------|----------|---------------|
    /// | `JWT_PRIVATE_KEY_PATH`    | **yes**  | --            |
    /// | `JWT_PUBLIC_KEY_PATH`     | **yes**  | --            |
    /// | `JWT_ISSUER`              | no       | `catalog-api` |
    /// | `JWT_ACCESS_EXPIRY_MINS`  | no       | `15`          |
    /// | `JWT_REFRESH_EXPIRY_DAYS` | no       | `30`          |
    pub fn from_env() -> Result<Self, ConfigError> {
        let access_token_expiry_mins = env_or("JWT_ACCESS_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS)?;
        if access_token_expiry_mins <= 0 {
            return Err(ConfigError::Invalid {
                key: "JWT_ACCESS_EXPIRY_MINS",
                value: access_token_expiry_mins.to_string(),
                reason: "must be positive".into(),
            });
        }
        let refresh_token_expiry_days =
            env_or("JWT_REFRESH_EXPIRY_DAYS", DEFAULT_REFRESH_EXPIRY_DAYS)?;
        if refresh_token_expiry_days <= 0 {
            return Err(ConfigError::Invalid {
                key: "JWT_REFRESH_EXPIRY_DAYS",
                value: refresh_token_expiry_days.to_string(),
                reason: "must be positive".into(),
            });
        }

        Ok(Self {
            private_key_pem: read_key_file("JWT_PRIVATE_KEY_PATH")?,
            public_key_pem: read_key_file("JWT_PUBLIC_KEY_PATH")?,
            issuer: env_or("JWT_ISSUER", DEFAULT_ISSUER.to_string())?,
            access_token_expiry_mins,
            refresh_token_expiry_days,
        })
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_expiry_days)
    }
}

/// Verifies access tokens with the public key only.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn from_ed_pem(public_pem: &[u8], issuer: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let decoding = DecodingKey::from_ed_pem(public_pem)?;

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Tokens are dead the second `exp` passes.
        validation.leeway = 0;

        Ok(Self {
            decoding,
            validation,
        })
    }

    /// Validate signature, algorithm, issuer and expiry and return the claims.
    pub fn verify(&self, token: &str) -> Result<AuthClaims, InvalidToken> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.into_auth_claims())
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                InvalidToken
            })
    }
}

/// Issues access tokens. Stateless apart from the key material.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    verifier: TokenVerifier,
    issuer: String,
    access_ttl: Duration,
}

impl TokenSigner {
    pub fn from_ed_pem(
        private_pem: &[u8],
        public_pem: &[u8],
        issuer: impl Into<String>,
        access_ttl: Duration,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        let issuer = issuer.into();
        Ok(Self {
            encoding: EncodingKey::from_ed_pem(private_pem)?,
            verifier: TokenVerifier::from_ed_pem(public_pem, &issuer)?,
            issuer,
            access_ttl,
        })
    }

    /// Build a signer from [`JwtConfig`], reporting bad key material as a
    /// configuration error.
    pub fn from_config(config: &JwtConfig) -> Result<Self, ConfigError> {
        Self::from_ed_pem(
            config.private_key_pem.as_bytes(),
            config.public_key_pem.as_bytes(),
            config.issuer.clone(),
            Duration::minutes(config.access_token_expiry_mins),
        )
        .map_err(|e| ConfigError::InvalidKey(e.to_string()))
    }

    /// A verifier for tokens produced by this signer.
    pub fn verifier(&self) -> TokenVerifier {
        self.verifier.clone()
    }

    /// Sign an access token for the given identity.
    pub fn issue(
        &self,
        user_id: DbId,
        username: &str,
        role: Role,
    ) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let expires_in_secs = self.access_ttl.num_seconds();

        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            role,
            iss: self.issuer.clone(),
            iat: now,
            exp: now + expires_in_secs,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::EdDSA), &claims, &self.encoding)?;
        Ok(IssuedToken {
            token,
            expires_in_secs,
        })
    }
}
