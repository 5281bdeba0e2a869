//! Handlers for the `/admin/users` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use catalog_core::types::DbId;

use super::auth::RevokedResponse;
use crate::error::AppResult;
use crate::middleware::rbac::{RequireAdmin, RequireModerator};
use crate::state::AppState;

/// POST /api/v1/admin/users/{id}/revoke-sessions
///
/// Kill switch for a compromised account. Moderator or above.
pub async fn revoke_user_sessions(
    State(state): State<AppState>,
    RequireModerator(actor): RequireModerator,
    Path(user_id): Path<DbId>,
) -> AppResult<Json<RevokedResponse>> {
    let revoked = state.auth.revoke_all_sessions(user_id).await?;
    tracing::info!(actor_id = %actor.user_id, target_id = %user_id, revoked, "Sessions revoked by staff");
    Ok(Json(RevokedResponse { revoked }))
}

/// DELETE /api/v1/admin/users/{id}
///
/// Soft-delete an account. Admin only.
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(actor): RequireAdmin,
    Path(user_id): Path<DbId>,
) -> AppResult<StatusCode> {
    state.auth.delete_user(user_id).await?;
    tracing::info!(actor_id = %actor.user_id, target_id = %user_id, "User deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}
