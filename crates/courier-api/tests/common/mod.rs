//! Shared fixtures: an app over the in-process bus, a temp-dir store, an
//! in-memory session repository, and the fixture signing key.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use bytes::Bytes;
use tower::ServiceExt;

use courier_api::{AppState, build_app};
use courier_auth::jwks::KeySet;
use courier_auth::testing::{claims_for, mint_token, test_signing_key};
use courier_auth::{
    AuthError, IdentityAuthenticator, KeyProvider, MemorySessionRepository, SessionStore,
    TokenVerifier,
};
use courier_bus::MemoryBus;
use courier_core::config::AppConfig;
use courier_core::traits::bus::MessageBus;
use courier_core::types::UserHash;
use courier_realtime::{ConnectionAuthenticator, RealtimeEngine};
use courier_storage::LocalArtifactStore;

#[derive(Debug)]
struct FixtureKeys;

#[async_trait]
impl KeyProvider for FixtureKeys {
    fn source(&self) -> &str {
        "fixture"
    }

    async fn fetch(&self) -> Result<KeySet, AuthError> {
        Ok(Arc::new(vec![test_signing_key("k1")]))
    }
}

pub struct TestApp {
    pub state: AppState,
    pub bus: Arc<MemoryBus>,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default();

        let bus = Arc::new(MemoryBus::new());
        let store = Arc::new(
            LocalArtifactStore::new(dir.path().to_str().unwrap(), "http://files.test")
                .await
                .unwrap(),
        );
        let engine = RealtimeEngine::new(&config.realtime, &config.bus, bus.clone(), store);

        let identity = IdentityAuthenticator::new(
            Arc::new(FixtureKeys),
            TokenVerifier::new("app1", vec!["https://accounts.google.com".to_string()]),
        );
        let sessions = Arc::new(SessionStore::new(
            Arc::new(MemorySessionRepository::new()),
            &config.session,
        ));
        let authenticator = ConnectionAuthenticator::new(identity, sessions);

        Self {
            state: AppState::new(config, authenticator, engine),
            bus,
            _dir: dir,
        }
    }

    pub fn router(&self) -> Router {
        build_app(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router().oneshot(request).await.unwrap()
    }

    /// Publishes `data` to the topic of `subject`, creating it if needed.
    pub async fn publish_to(&self, subject: &str, data: &'static str) {
        let topic = self
            .state
            .engine
            .subscriptions
            .get_or_create_topic(&UserHash::from_subject(subject))
            .await
            .unwrap();
        self.bus.publish(&topic, Bytes::from(data)).await.unwrap();
    }

    /// Waits until `n` subscriptions exist on the bus.
    pub async fn wait_for_subscriptions(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.bus.subscription_count() != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}

/// A valid identity token for `subject`.
pub fn identity_token(subject: &str) -> String {
    mint_token("k1", &claims_for(subject, &format!("{subject}@x.com")))
}
