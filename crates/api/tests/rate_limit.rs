//! Per-IP rate limiting through the full middleware stack.
//!
//! Uses `/health` so no request touches the blocking pool, which keeps the
//! paused clock from auto-advancing into the request timeout.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::header::RETRY_AFTER;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use catalog_api::middleware::rate_limit::RateLimitConfig;
use common::{body_json, send, TestApp};

fn limited_app() -> TestApp {
    let mut config = common::test_config();
    config.rate_limit = RateLimitConfig {
        per_second: 2,
        burst: 4,
        idle_ttl_secs: 600,
        sweep_interval_secs: 60,
    };
    common::build_test_app_with_config(config)
}

async fn health_from(router: Router, ip: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header("x-real-ip", ip)
        .body(Body::empty())
        .unwrap();
    send(router, request).await
}

#[tokio::test(start_paused = true)]
async fn test_burst_then_rejected_with_retry_after() {
    let app = limited_app();

    for _ in 0..4 {
        let response = health_from(app.router.clone(), "198.51.100.7").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = health_from(app.router.clone(), "198.51.100.7").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[RETRY_AFTER], "1");
    let json = body_json(response).await;
    assert_eq!(json["code"], "RATE_LIMITED");
    assert_eq!(json["retry_after"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_clients_are_limited_independently() {
    let app = limited_app();

    for _ in 0..5 {
        health_from(app.router.clone(), "198.51.100.7").await;
    }
    let response = health_from(app.router.clone(), "198.51.100.7").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = health_from(app.router.clone(), "198.51.100.8").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_tokens_refill_over_time() {
    let app = limited_app();

    for _ in 0..4 {
        health_from(app.router.clone(), "198.51.100.7").await;
    }
    let response = health_from(app.router.clone(), "198.51.100.7").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::advance(Duration::from_millis(500)).await;
    let response = health_from(app.router.clone(), "198.51.100.7").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = health_from(app.router.clone(), "198.51.100.7").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test(start_paused = true)]
async fn test_forwarded_for_first_hop_is_the_client() {
    let app = limited_app();

    for _ in 0..4 {
        let request = Request::builder()
            .uri("/health")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(app.router.clone(), request).await.status(), StatusCode::OK);
    }

    let response = health_from(app.router.clone(), "203.0.113.9").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

/// Without any client address the limiter admits the request.
#[tokio::test(start_paused = true)]
async fn test_unknown_client_is_admitted() {
    let app = limited_app();

    for _ in 0..10 {
        let response = common::get(app.router.clone(), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
