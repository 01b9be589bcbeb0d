//! Courier Server: authenticated real-time notification relay.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use courier_api::AppState;
use courier_auth::{
    CachedKeyProvider, HttpKeyProvider, IdentityAuthenticator, MemorySessionRepository,
    SessionStore, SessionSweeper, TokenVerifier,
};
use courier_core::config::AppConfig;
use courier_core::error::{AppError, ErrorKind};
use courier_core::traits::session::SessionRepository;
use courier_database::{DatabasePool, PgSessionRepository};
use courier_realtime::{ConnectionAuthenticator, RealtimeEngine};
use courier_storage::LocalArtifactStore;

#[tokio::main]
async fn main() {
    let env = std::env::var("COURIER_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Courier v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Message bus ──────────────────────────────────────
    tracing::info!(provider = %config.bus.provider, "Initializing message bus...");
    let bus = courier_bus::build_bus(&config.bus).await?;

    // ── Step 2: Artifact storage ─────────────────────────────────
    tracing::info!(root = %config.storage.root, "Initializing artifact storage...");
    let store = Arc::new(LocalArtifactStore::from_config(&config.storage).await?);

    // ── Step 3: Session persistence ──────────────────────────────
    let mut db_pool = None;
    let session_repo: Arc<dyn SessionRepository> = match config.session.backend.as_str() {
        "postgres" => {
            tracing::info!("Connecting to database...");
            let pool = DatabasePool::connect(&config.database).await?;
            tracing::info!("Running database migrations...");
            courier_database::run_migrations(pool.pool()).await?;
            let repo = Arc::new(PgSessionRepository::new(pool.pool().clone()));
            db_pool = Some(pool);
            repo
        }
        "memory" => Arc::new(MemorySessionRepository::new()),
        other => {
            return Err(AppError::configuration(format!(
                "Unknown session backend: {other}"
            )));
        }
    };
    let sessions = Arc::new(SessionStore::new(session_repo, &config.session));

    // ── Step 4: Identity token verification ──────────────────────
    tracing::info!(jwks_url = %config.auth.jwks_url, "Initializing authentication...");
    let key_source = HttpKeyProvider::new(
        config.auth.jwks_url.clone(),
        Duration::from_secs(config.auth.key_fetch_timeout_seconds),
    )?;
    let keys = Arc::new(CachedKeyProvider::new(
        Arc::new(key_source),
        Duration::from_secs(config.auth.key_cache_ttl_seconds),
    ));
    let verifier = TokenVerifier::from_config(&config.auth);
    let authenticator =
        ConnectionAuthenticator::new(IdentityAuthenticator::new(keys, verifier), sessions.clone());

    // ── Step 5: Realtime engine ──────────────────────────────────
    let engine = RealtimeEngine::new(&config.realtime, &config.bus, bus, store);

    // ── Step 6: Expired-session sweep ────────────────────────────
    let mut sweeper = SessionSweeper::new(sessions, &config.session.cleanup_cron).await?;
    sweeper.start().await?;

    // ── Step 7: Build and start HTTP server ──────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let state = AppState::new(config, authenticator, engine.clone());
    let app = courier_api::build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Internal, format!("Failed to bind {addr}"), e)
        })?;

    tracing::info!("Courier listening on {}", addr);

    // ── Step 8: Graceful shutdown ────────────────────────────────
    // Long-lived streams keep requests open, so the engine is torn down
    // before the server waits for in-flight requests.
    let shutdown_engine = engine.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, closing connections...");
            shutdown_engine.shutdown(grace).await;
        })
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Server error", e))?;

    // ── Step 9: Stop background work ─────────────────────────────
    if let Err(e) = sweeper.shutdown().await {
        tracing::warn!(error = %e, "Session sweeper did not stop cleanly");
    }
    if let Some(pool) = db_pool {
        pool.close().await;
    }

    tracing::info!(metrics = ?engine.metrics.snapshot(), "Courier shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
