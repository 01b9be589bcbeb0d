//! Route definitions for the Courier HTTP API.
//!
//! The router receives `AppState` and passes it to all handlers via Axum's
//! `State` extractor.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the Axum router with all routes and the body limit.
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.server.max_body_bytes;

    Router::new()
        .merge(auth_routes())
        .merge(stream_routes())
        .route("/upload", post(handlers::upload::upload))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(axum_middleware::from_fn(
            middleware::logging::request_logging,
        ))
        .with_state(state)
}

/// Login sessions
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/cleanup", post(handlers::auth::cleanup))
}

/// Long-lived delivery connections
fn stream_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(handlers::events::events))
        .route("/ws", get(handlers::ws::ws_upgrade))
}
