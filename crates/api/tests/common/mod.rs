#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use catalog_api::auth::jwt::JwtConfig;
use catalog_api::auth::password::PasswordConfig;
use catalog_api::config::{LogFormat, ServerConfig};
use catalog_api::middleware::rate_limit::RateLimitConfig;
use catalog_api::router::build_app_router;
use catalog_api::state::AppState;
use catalog_db::memory::{MemoryCredentialStore, MemorySessionStore};
use catalog_db::store::{CredentialStore, SessionStore};
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const PRIVATE_PEM: &str = include_str!("../fixtures/ed25519_private.pem");
pub const PUBLIC_PEM: &str = include_str!("../fixtures/ed25519_public.pem");

/// Build a test `ServerConfig` with the fixture keys, a minimal argon2 work
/// factor and a rate limit high enough not to interfere.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "postgres://unused".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            private_key_pem: PRIVATE_PEM.to_string(),
            public_key_pem: PUBLIC_PEM.to_string(),
            issuer: "catalog-api".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 30,
        },
        password: PasswordConfig {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        },
        rate_limit: RateLimitConfig {
            per_second: 1000,
            burst: 2000,
            idle_ttl_secs: 600,
            sweep_interval_secs: 60,
        },
        session_cleanup_interval_secs: 3600,
        refresh_cookie_secure: true,
        log_format: LogFormat::Pretty,
    }
}

/// Router plus direct handles on the in-memory stores behind it.
pub struct TestApp {
    pub router: Router,
    pub users: Arc<MemoryCredentialStore>,
    pub sessions: Arc<MemorySessionStore>,
}

/// Full application router over in-memory storage.
pub fn build_test_app() -> TestApp {
    build_test_app_with_config(test_config())
}

pub fn build_test_app_with_config(config: ServerConfig) -> TestApp {
    let users = Arc::new(MemoryCredentialStore::new());
    let sessions = Arc::new(MemorySessionStore::new());
    let router = build_router(config, users.clone(), sessions.clone());
    TestApp {
        router,
        users,
        sessions,
    }
}

/// Full application router over arbitrary storage backends.
pub fn build_router(
    config: ServerConfig,
    users: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
) -> Router {
    let state = AppState::new(config, users, sessions).expect("test state builds");
    build_app_router(state).expect("test router builds")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.expect("router is infallible")
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    let request = Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("body is JSON")
}
