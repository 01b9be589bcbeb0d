//! Auth handlers: login, logout, expired-session cleanup.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderValue;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use axum_extra::headers::Cookie;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use courier_core::error::AppError;
use courier_realtime::Credential;

use super::{TokenQuery, authenticate, session_token};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Body of `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Signed identity token.
    pub token: String,
}

/// Issued session.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Session token; also set as a cookie.
    pub token: String,
    /// When the session expires.
    pub expires_at: DateTime<Utc>,
    /// Email of the signed-in user.
    pub email: String,
}

/// Result of `POST /auth/logout`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    /// Whether a session was deleted.
    pub revoked: bool,
}

/// Result of `POST /auth/cleanup`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    /// Number of expired sessions deleted.
    pub deleted: u64,
}

fn cookie_header(name: &str, value: &str, max_age: i64) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{name}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax"
    ))
    .map_err(|e| ApiError(AppError::internal(format!("Invalid session cookie: {e}"))))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    let identity = authenticate(
        &state,
        Some(Credential::IdentityToken(req.token)),
        "/auth/login",
    )
    .await?;

    let session = state.sessions().issue(&identity).await?;
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    let cookie = cookie_header(&state.config.session.cookie_name, &session.token, max_age)?;

    info!(user_hash = %identity.user_hash(), "User signed in");

    let body = LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        email: identity.email,
    };
    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    cookies: Option<TypedHeader<Cookie>>,
) -> ApiResult<Response> {
    let Some(token) = session_token(&state, &query, cookies.as_ref().map(|c| &c.0)) else {
        warn!(
            route = "/auth/logout",
            reason = "missing_credential",
            "Authentication rejected"
        );
        return Err(ApiError::unauthorized());
    };

    let revoked = state.sessions().revoke(&token).await?;
    let cookie = cookie_header(&state.config.session.cookie_name, "", 0)?;

    Ok(([(SET_COOKIE, cookie)], Json(LogoutResponse { revoked })).into_response())
}

/// POST /auth/cleanup
pub async fn cleanup(State(state): State<AppState>) -> ApiResult<Json<CleanupResponse>> {
    let deleted = state.sessions().delete_expired().await?;
    Ok(Json(CleanupResponse { deleted }))
}
