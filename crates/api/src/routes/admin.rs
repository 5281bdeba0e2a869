//! Route definitions for the `/admin` resource.

use axum::routing::{delete, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// POST   /users/{id}/revoke-sessions -> revoke_user_sessions (moderator+)
/// DELETE /users/{id}                 -> delete_user (admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/users/{id}/revoke-sessions",
            post(admin::revoke_user_sessions),
        )
        .route("/users/{id}", delete(admin::delete_user))
}
