//! Top-level real-time engine.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};
use uuid::Uuid;

use courier_core::config::{BusConfig, RealtimeConfig};
use courier_core::traits::bus::MessageBus;
use courier_core::traits::storage::ArtifactStore;
use courier_core::types::VerifiedIdentity;

use crate::connection::{ConnectionLifecycle, InboundTask, OpenConnection};
use crate::error::RelayError;
use crate::ingest::IngestService;
use crate::metrics::RelayMetrics;
use crate::relay::{BacklogReplayer, FrameTransport, StreamRelay};
use crate::subscription::SubscriptionManager;

/// Central real-time engine.
///
/// Every connection's cancellation token is a child of the engine's root
/// token, so [`shutdown`](Self::shutdown) tears down every connection.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Topic and subscription provisioning.
    pub subscriptions: Arc<SubscriptionManager>,
    /// Upload ingest.
    pub ingest: Arc<IngestService>,
    /// Metrics collector.
    pub metrics: Arc<RelayMetrics>,
    lifecycle: ConnectionLifecycle,
    config: RealtimeConfig,
    shutdown: CancellationToken,
    connections: TaskTracker,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("connections", &self.connections.len())
            .finish()
    }
}

impl RealtimeEngine {
    /// Creates the engine over a bus and an artifact store.
    pub fn new(
        config: &RealtimeConfig,
        bus_config: &BusConfig,
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let metrics = Arc::new(RelayMetrics::new());
        let subscriptions = Arc::new(SubscriptionManager::new(
            Arc::clone(&bus),
            bus_config,
            metrics.clone(),
        ));
        let backlog = config.backlog.enabled.then(|| {
            BacklogReplayer::new(Arc::clone(&store), config.backlog.max_items, metrics.clone())
        });
        let lifecycle = ConnectionLifecycle::new(
            StreamRelay::new(
                bus,
                Duration::from_secs(bus_config.operation_timeout_seconds),
                metrics.clone(),
            ),
            backlog,
            config.writer_buffer,
            metrics.clone(),
        );
        let ingest = Arc::new(IngestService::new(
            store,
            subscriptions.clone(),
            metrics.clone(),
        ));

        info!(
            writer_buffer = config.writer_buffer,
            backlog = config.backlog.enabled,
            "Real-time engine initialized"
        );

        Self {
            subscriptions,
            ingest,
            metrics,
            lifecycle,
            config: config.clone(),
            shutdown: CancellationToken::new(),
            connections: TaskTracker::new(),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Provisions `identity`'s topic and a fresh subscription for a new
    /// connection.
    pub async fn open(&self, identity: VerifiedIdentity) -> Result<OpenConnection, RelayError> {
        if self.shutdown.is_cancelled() {
            return Err(RelayError::UpstreamCollaboratorFailed(
                "engine is shutting down".to_string(),
            ));
        }
        let user_hash = identity.user_hash();
        let topic = self.subscriptions.get_or_create_topic(&user_hash).await?;
        let lease = self
            .subscriptions
            .create_subscription(&topic, &user_hash)
            .await?;

        Ok(OpenConnection {
            conn_id: Uuid::new_v4(),
            identity,
            user_hash,
            lease,
            cancel: self.shutdown.child_token(),
        })
    }

    /// Serves an opened connection until it is cancelled and torn down.
    pub async fn serve<T: FrameTransport>(
        &self,
        conn: OpenConnection,
        transport: T,
        inbound: Option<InboundTask>,
    ) -> Result<(), RelayError> {
        self.connections
            .track_future(self.lifecycle.run(conn, transport, inbound))
            .await
    }

    /// Cancels every connection and waits up to `grace` for their
    /// teardown.
    pub async fn shutdown(&self, grace: Duration) {
        info!(
            active = self.connections.len(),
            "Shutting down real-time engine"
        );
        self.shutdown.cancel();
        self.connections.close();

        if tokio::time::timeout(grace, self.connections.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = self.connections.len(),
                "Connections still tearing down after grace period"
            );
        }
        info!(metrics = ?self.metrics.snapshot(), "Real-time engine shut down");
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
