//! Handlers for the `/auth` resource.
//!
//! The refresh token travels in the JSON body and, for browser clients, in
//! an `HttpOnly` cookie scoped to the auth path. Refresh and logout accept
//! either, preferring the body.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use catalog_core::types::Timestamp;
use catalog_core::validation::{ChangePasswordInput, LoginInput, RegisterInput};
use catalog_db::models::user::UserProfile;
use serde::{Deserialize, Serialize};

use crate::auth::service::{AuthSession, ClientInfo};
use crate::error::{AppError, AppResult};
use crate::extract::JsonBody;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub const REFRESH_COOKIE: &str = "refresh_token";
const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /auth/refresh` and `POST /auth/logout`. The field may be
/// omitted when the cookie is present.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Successful authentication response returned by login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub refresh_token: String,
    pub refresh_expires_at: Timestamp,
    pub user: UserProfile,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            access_token: session.tokens.access_token,
            token_type: "Bearer",
            expires_in: session.tokens.expires_in,
            refresh_token: session.tokens.refresh_token,
            refresh_expires_at: session.tokens.refresh_expires_at,
            user: session.user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RevokedResponse {
    pub revoked: u64,
}

// ---------------------------------------------------------------------------
// Cookie helpers
// ---------------------------------------------------------------------------

fn refresh_cookie(state: &AppState, token: &str) -> String {
    let max_age = state.config.jwt.refresh_ttl().num_seconds();
    let secure = if state.config.refresh_cookie_secure {
        "; Secure"
    } else {
        ""
    };
    format!(
        "{REFRESH_COOKIE}={token}; Path={REFRESH_COOKIE_PATH}; HttpOnly; SameSite=Strict; Max-Age={max_age}{secure}"
    )
}

fn cleared_refresh_cookie(state: &AppState) -> String {
    let secure = if state.config.refresh_cookie_secure {
        "; Secure"
    } else {
        ""
    };
    format!(
        "{REFRESH_COOKIE}=; Path={REFRESH_COOKIE_PATH}; HttpOnly; SameSite=Strict; Max-Age=0{secure}"
    )
}

/// Value of the refresh cookie, if the request carries one.
pub fn refresh_token_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == REFRESH_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Refresh token from the JSON body, falling back to the cookie.
///
/// An empty body is allowed so cookie-only clients need not send JSON.
fn presented_refresh_token(headers: &HeaderMap, body: &Bytes) -> AppResult<Option<String>> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let request: RefreshRequest = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?;
        request.refresh_token.filter(|t| !t.is_empty())
    };
    Ok(from_body.or_else(|| refresh_token_from_cookies(headers)))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterInput>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    let profile = state.auth.register(input).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// POST /api/v1/auth/login
///
/// Authenticate with username or email + password.
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    JsonBody(input): JsonBody<LoginInput>,
) -> AppResult<impl IntoResponse> {
    let session = state.auth.login(input, client).await?;
    let cookie = refresh_cookie(&state, &session.tokens.refresh_token);
    Ok(([(SET_COOKIE, cookie)], Json(AuthResponse::from(session))))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a refresh token for a new access + refresh pair. The presented
/// token is revoked.
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let token = presented_refresh_token(&headers, &body)?.unwrap_or_default();
    let session = state.auth.refresh(&token, client).await?;
    let cookie = refresh_cookie(&state, &session.tokens.refresh_token);
    Ok(([(SET_COOKIE, cookie)], Json(AuthResponse::from(session))))
}

/// POST /api/v1/auth/logout
///
/// Revoke the presented session. Always 204, even for unknown tokens.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    if let Some(token) = presented_refresh_token(&headers, &body)? {
        state.auth.logout(&token).await?;
    }
    Ok((
        StatusCode::NO_CONTENT,
        [(SET_COOKIE, cleared_refresh_cookie(&state))],
    ))
}

/// POST /api/v1/auth/logout-all
///
/// Revoke every session of the caller.
pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let revoked = state.auth.revoke_all_sessions(user.user_id).await?;
    Ok((
        [(SET_COOKIE, cleared_refresh_cookie(&state))],
        Json(RevokedResponse { revoked }),
    ))
}

/// GET /api/v1/auth/me
pub async fn me(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<UserProfile>> {
    let profile = state.auth.current_user(user.user_id).await?;
    Ok(Json(profile))
}

/// PUT /api/v1/auth/password
///
/// Change the caller's password. All sessions, including the current one,
/// are revoked.
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(input): JsonBody<ChangePasswordInput>,
) -> AppResult<impl IntoResponse> {
    state.auth.change_password(user.user_id, input).await?;
    Ok((
        StatusCode::NO_CONTENT,
        [(SET_COOKIE, cleared_refresh_cookie(&state))],
    ))
}
