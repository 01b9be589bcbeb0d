//! Push-stream endpoint.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, Cookie};
use tracing::{debug, info};

use courier_realtime::{Credential, EventStreamTransport};

use super::{TokenQuery, authenticate, session_token};
use crate::error::ApiResult;
use crate::state::AppState;

/// GET /events
///
/// Authenticated by `Authorization: Bearer <identity token>`, or by a
/// session token in `?token=` or the session cookie. The credential is
/// resolved before any subscription exists.
pub async fn events(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    cookies: Option<TypedHeader<Cookie>>,
) -> ApiResult<Response> {
    let credential = match bearer {
        Some(TypedHeader(Authorization(bearer))) => {
            Some(Credential::IdentityToken(bearer.token().to_string()))
        }
        None => session_token(&state, &query, cookies.as_ref().map(|c| &c.0))
            .map(Credential::SessionToken),
    };
    let identity = authenticate(&state, credential, "/events").await?;

    let conn = state.engine.open(identity).await?;
    let conn_id = conn.conn_id;
    info!(
        conn_id = %conn_id,
        user_hash = %conn.user_hash,
        subscription = conn.subscription(),
        "Event stream opened"
    );

    let (transport, body) = EventStreamTransport::channel();
    let engine = state.engine.clone();
    tokio::spawn(async move {
        if let Err(e) = engine.serve(conn, transport, None).await {
            debug!(conn_id = %conn_id, reason = e.label(), "Event stream ended with error");
        }
    });

    Ok((
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
