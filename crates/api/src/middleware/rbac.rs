//! Role-based access control (RBAC) extractors.
//!
//! Gates compare roles by their total order, so a route requiring
//! `moderator` also admits `admin`. Anonymous requests get 401, authenticated
//! requests below the minimum role get 403.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use catalog_core::error::CoreError;
use catalog_core::roles::Role;

use super::auth::AuthUser;
use crate::auth::jwt::AuthClaims;
use crate::error::AppError;

/// Check that verified claims exist and meet `minimum`.
pub fn authorize(claims: Option<&AuthClaims>, minimum: Role) -> Result<&AuthClaims, CoreError> {
    let claims =
        claims.ok_or_else(|| CoreError::Unauthorized("Authentication required".into()))?;
    if !claims.role.satisfies(minimum) {
        tracing::warn!(
            user_id = %claims.user_id,
            role = %claims.role,
            required = %minimum,
            "Insufficient role"
        );
        return Err(CoreError::Forbidden(format!("{minimum} role required")));
    }
    Ok(claims)
}

fn require(parts: &Parts, minimum: Role) -> Result<AuthUser, AppError> {
    authorize(parts.extensions.get::<AuthClaims>(), minimum)
        .map(AuthUser::from)
        .map_err(AppError::Core)
}

/// Requires `moderator` or above.
///
/// ```ignore
/// async fn moderate(RequireModerator(user): RequireModerator) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireModerator(pub AuthUser);

impl<S> FromRequestParts<S> for RequireModerator
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require(parts, Role::Moderator).map(RequireModerator)
    }
}

/// Requires the `admin` role.
#[derive(Debug)]
pub struct RequireAdmin(pub AuthUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require(parts, Role::Admin).map(RequireAdmin)
    }
}
