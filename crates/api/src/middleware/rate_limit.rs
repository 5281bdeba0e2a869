//! Per-client-IP rate limiting using a token bucket.
//!
//! Each client IP gets a bucket holding up to `burst` tokens that refills at
//! `per_second` tokens per second. A request that finds its bucket empty is
//! rejected with 429 immediately; nothing queues. Buckets idle longer than
//! the configured TTL are dropped by [`RateLimiter::spawn_sweeper`].

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use catalog_core::error::CoreError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{env_or, ConfigError};
use crate::error::AppError;
use crate::state::AppState;

/// Token bucket parameters and idle eviction policy.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Sustained requests per second.
    pub per_second: u32,
    /// Bucket capacity. Always greater than `per_second`.
    pub burst: u32,
    /// Buckets untouched for this long are evicted.
    pub idle_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    /// | Env Var                          | Default |
    /// |----------------------------------|---------|
    /// | `RATE_LIMIT_PER_SECOND`          | `10`    |
    /// | `RATE_LIMIT_BURST`               | `20`    |
    /// | `RATE_LIMIT_IDLE_TTL_SECS`       | `600`   |
    /// | `RATE_LIMIT_SWEEP_INTERVAL_SECS` | `60`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self {
            per_second: env_or("RATE_LIMIT_PER_SECOND", 10u32)?,
            burst: env_or("RATE_LIMIT_BURST", 20u32)?,
            idle_ttl_secs: env_or("RATE_LIMIT_IDLE_TTL_SECS", 600u64)?,
            sweep_interval_secs: env_or("RATE_LIMIT_SWEEP_INTERVAL_SECS", 60u64)?,
        }
        .validated()
    }

    /// Reject a zero rate or a burst that does not exceed the rate.
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.per_second == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_PER_SECOND",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        if self.burst <= self.per_second {
            return Err(ConfigError::BurstNotAboveRate {
                rate: self.per_second,
                burst: self.burst,
            });
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_SWEEP_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Refill for the elapsed time, then take one token.
    ///
    /// Returns `None` if allowed, or `Some(wait)` until a token is available.
    fn try_take(&mut self, rate: f64, capacity: f64, now: Instant) -> Option<Duration> {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            Some(Duration::from_secs_f64((1.0 - self.tokens) / rate))
        }
    }
}

/// Shared per-IP limiter. Cheap to clone; clones share the bucket map.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<IpAddr, TokenBucket>>>,
    rate: f64,
    capacity: f64,
    idle_ttl: Duration,
    sweep_interval: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate: f64::from(config.per_second),
            capacity: f64::from(config.burst),
            idle_ttl: Duration::from_secs(config.idle_ttl_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }

    /// Bucket state stays consistent even if a holder panicked, so a
    /// poisoned lock is recovered rather than propagated.
    fn buckets(&self) -> MutexGuard<'_, HashMap<IpAddr, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Try to take a token for `ip`.
    ///
    /// Returns `None` if allowed, or `Some(wait)` if rate limited.
    pub fn try_acquire(&self, ip: IpAddr) -> Option<Duration> {
        let now = Instant::now();
        let mut buckets = self.buckets();
        buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::full(self.capacity, now))
            .try_take(self.rate, self.capacity, now)
    }

    /// Drop buckets idle for longer than the TTL. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets();
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) < self.idle_ttl);
        before - buckets.len()
    }

    /// Number of client IPs currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets().len()
    }

    /// Run [`sweep`](Self::sweep) on the configured interval until `cancel`
    /// fires.
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(limiter.sweep_interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Rate limiter sweeper stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = limiter.tracked_clients(), "Evicted idle rate-limit buckets");
                        }
                    }
                }
            }
        })
    }
}

/// Resolve the client IP: `X-Real-IP`, then the first hop of
/// `X-Forwarded-For`, then the transport peer. Unparseable header values
/// fall through to the next source.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());

    let forwarded_for = || {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
    };

    real_ip.or_else(forwarded_for).or(peer)
}

/// Middleware applying [`AppState::rate_limiter`] to every request.
///
/// Requests whose client IP cannot be determined are admitted.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let Some(ip) = client_ip(request.headers(), peer) else {
        tracing::debug!("No client IP available, skipping rate limit");
        return next.run(request).await;
    };

    match state.rate_limiter.try_acquire(ip) {
        None => next.run(request).await,
        Some(wait) => {
            let retry_after_secs = wait.as_secs_f64().ceil().max(1.0) as u64;
            tracing::warn!(%ip, retry_after_secs, "Rate limit exceeded");
            AppError::Core(CoreError::RateLimited { retry_after_secs }).into_response()
        }
    }
}
