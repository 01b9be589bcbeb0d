//! # courier-api
//!
//! HTTP layer for Courier built on Axum.
//!
//! Routes:
//!
//! - `GET /events`: push stream of the caller's notifications
//! - `GET /ws`: socket carrying notifications out and uploads in
//! - `POST /auth/login`, `POST /auth/logout`, `POST /auth/cleanup`: sessions
//! - `POST /upload`: store an artifact and notify its owner

pub mod app;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::build_app;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
