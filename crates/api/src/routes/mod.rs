pub mod admin;
pub mod auth;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// All routes mounted under `/api/v1`.
///
/// ```text
/// /auth/...          credentials and sessions
/// /admin/users/...   staff account controls
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
}
