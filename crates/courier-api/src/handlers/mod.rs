//! Route handlers.

pub mod auth;
pub mod events;
pub mod upload;
pub mod ws;

use axum_extra::headers::Cookie;
use serde::Deserialize;
use tracing::{error, warn};

use courier_core::types::VerifiedIdentity;
use courier_realtime::Credential;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `?token=` query parameter carrying a session token.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    /// Session token issued at login.
    pub token: Option<String>,
}

/// Session token from the query string, falling back to the session cookie.
pub(crate) fn session_token(
    state: &AppState,
    query: &TokenQuery,
    cookies: Option<&Cookie>,
) -> Option<String> {
    query
        .token
        .clone()
        .filter(|t| !t.is_empty())
        .or_else(|| {
            cookies
                .and_then(|c| c.get(&state.config.session.cookie_name))
                .map(str::to_string)
        })
}

/// Resolves a credential, logging the precise reason on failure.
pub(crate) async fn authenticate(
    state: &AppState,
    credential: Option<Credential>,
    route: &'static str,
) -> ApiResult<VerifiedIdentity> {
    let Some(credential) = credential else {
        warn!(route, reason = "missing_credential", "Authentication rejected");
        return Err(ApiError::unauthorized());
    };

    match state.authenticator.authenticate(&credential).await {
        Ok(identity) => Ok(identity),
        Err(e) if e.is_rejection() => {
            warn!(route, reason = e.label(), "Authentication rejected");
            Err(ApiError::unauthorized())
        }
        Err(e) => {
            error!(route, error = %e, "Credential lookup failed");
            Err(e.into())
        }
    }
}
