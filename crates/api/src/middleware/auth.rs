//! Bearer-token authentication.
//!
//! [`authenticate`] runs on every request. A request without an
//! `Authorization` header continues anonymously; a malformed header or a
//! token that fails verification is rejected with 401. Verified claims are
//! stored as an [`AuthClaims`] request extension for the extractors below and
//! in [`super::rbac`].
//!
//! The check also covers public routes. Clients must not attach a stale
//! access token to `POST /auth/refresh` or `POST /auth/logout`: an expired
//! bearer token is rejected with 401 before the refresh token is looked at.
//! Send those calls without an `Authorization` header.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use catalog_core::error::CoreError;
use catalog_core::roles::Role;
use catalog_core::types::DbId;

use crate::auth::jwt::AuthClaims;
use crate::error::AppError;
use crate::state::AppState;

/// Extract the token from a `Bearer <token>` header.
///
/// Returns `Ok(None)` when the header is absent and an error when it is
/// present but not exactly a bearer scheme followed by one token.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let malformed = || {
        AppError::Core(CoreError::Unauthorized(
            "Invalid Authorization format. Expected: Bearer <token>".into(),
        ))
    };

    let value = value.to_str().map_err(|_| malformed())?;
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => {
            Ok(Some(token))
        }
        _ => Err(malformed()),
    }
}

/// Middleware verifying the bearer token, if any, and attaching its claims.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = match bearer_token(request.headers())? {
        Some(token) => Some(state.verifier.verify(token).map_err(|_| {
            tracing::warn!(path = %request.uri().path(), "Rejected invalid bearer token");
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?),
        None => None,
    };

    if let Some(claims) = claims {
        request.extensions_mut().insert(claims);
    }
    Ok(next.run(request).await)
}

/// The authenticated caller, taken from verified token claims.
///
/// Rejects with 401 when the request is anonymous.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    pub username: String,
    pub role: Role,
}

impl From<&AuthClaims> for AuthUser {
    fn from(claims: &AuthClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username.clone(),
            role: claims.role,
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        super::rbac::authorize(parts.extensions.get::<AuthClaims>(), Role::LOWEST)
            .map(AuthUser::from)
            .map_err(AppError::Core)
    }
}
