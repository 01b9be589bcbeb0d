//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use courier_auth::SessionStore;
use courier_core::config::AppConfig;
use courier_realtime::{ConnectionAuthenticator, RealtimeEngine};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// Application configuration
    pub config: Arc<AppConfig>,

    // ── Auth ─────────────────────────────────────────────────
    /// Resolves identity and session tokens
    pub authenticator: ConnectionAuthenticator,

    // ── Realtime ─────────────────────────────────────────────
    /// Subscription provisioning, relay, and ingest
    pub engine: RealtimeEngine,
}

impl AppState {
    /// Creates the state.
    pub fn new(
        config: AppConfig,
        authenticator: ConnectionAuthenticator,
        engine: RealtimeEngine,
    ) -> Self {
        Self {
            config: Arc::new(config),
            authenticator,
            engine,
        }
    }

    /// Session store behind the authenticator.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.authenticator.sessions()
    }
}
