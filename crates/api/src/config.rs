use std::str::FromStr;

use crate::auth::jwt::JwtConfig;
use crate::auth::password::PasswordConfig;
use crate::middleware::rate_limit::RateLimitConfig;

/// Startup configuration failure. Any of these aborts the process.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read {key} from '{path}': {source}")]
    KeyFile {
        key: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    #[error("RATE_LIMIT_BURST ({burst}) must be greater than RATE_LIMIT_PER_SECOND ({rate})")]
    BurstNotAboveRate { rate: u32, burst: u32 },
}

/// Read `key` and parse it, falling back to `default` when unset.
pub(crate) fn env_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => match value.trim().parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        },
        Err(_) => Ok(default),
    }
}

/// Read a required variable.
pub(crate) fn env_required(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields except the database URL and key paths have defaults suitable
/// for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    pub database_url: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// Overall per-request deadline in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub rate_limit: RateLimitConfig,
    /// How often expired sessions are purged (default: `3600`).
    pub session_cleanup_interval_secs: u64,
    /// Whether the refresh cookie carries the `Secure` attribute (default: `true`).
    pub refresh_cookie_secure: bool,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `HOST`                          | `0.0.0.0`               |
    /// | `PORT`                          | `3000`                  |
    /// | `DATABASE_URL`                  | **required**            |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                    |
    /// | `SESSION_CLEANUP_INTERVAL_SECS` | `3600`                  |
    /// | `REFRESH_COOKIE_SECURE`         | `true`                  |
    /// | `LOG_FORMAT`                    | `pretty`                |
    ///
    /// JWT, password hashing and rate limiting read their own variables; see
    /// [`JwtConfig::from_env`], [`PasswordConfig::from_env`] and
    /// [`RateLimitConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = env_or("PORT", 3000u16)?;
        let database_url = env_required("DATABASE_URL")?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            database_url,
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30u64)?,
            jwt: JwtConfig::from_env()?,
            password: PasswordConfig::from_env()?,
            rate_limit: RateLimitConfig::from_env()?,
            session_cleanup_interval_secs: env_or("SESSION_CLEANUP_INTERVAL_SECS", 3600u64)?,
            refresh_cookie_secure: env_or("REFRESH_COOKIE_SECURE", true)?,
            log_format: env_or("LOG_FORMAT", LogFormat::Pretty)?,
        })
    }
}
