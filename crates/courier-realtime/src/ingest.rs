//! Upload ingest: store the artifact, then notify the owner's connections.

use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use courier_core::traits::storage::ArtifactStore;
use courier_core::types::UserHash;

use crate::error::RelayError;
use crate::message::FileNotification;
use crate::metrics::RelayMetrics;
use crate::stamp::MonotonicStamp;
use crate::subscription::SubscriptionManager;

/// Result of a successful ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    /// Artifact name.
    pub name: String,
    /// Storage location, `<userHash>/<stamp>`.
    pub location: String,
    /// Public URL of the artifact.
    pub url: String,
    /// Bus id of the published notification.
    pub message_id: String,
}

/// Stores uploads and publishes their notifications.
#[derive(Debug)]
pub struct IngestService {
    store: Arc<dyn ArtifactStore>,
    subscriptions: Arc<SubscriptionManager>,
    stamps: MonotonicStamp,
    metrics: Arc<RelayMetrics>,
}

impl IngestService {
    /// Creates the service.
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        subscriptions: Arc<SubscriptionManager>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            store,
            subscriptions,
            stamps: MonotonicStamp::new(),
            metrics,
        }
    }

    /// Stores `data` for `user` and publishes a notification to the
    /// user's topic.
    pub async fn ingest(
        &self,
        user: &UserHash,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<IngestReceipt, RelayError> {
        let location = format!("{}/{:016x}", user, self.stamps.next());
        let meta = self
            .store
            .write(&location, name, content_type, data.clone())
            .await?;
        let url = self.store.public_url(&meta.location);

        let topic = self.subscriptions.get_or_create_topic(user).await?;
        let payload = FileNotification::for_artifact(&meta, url.clone(), Some(&data[..])).to_payload()?;
        let message_id = self.subscriptions.bus().publish(&topic, payload).await?;

        RelayMetrics::incr(&self.metrics.uploads_ingested);
        info!(
            user_hash = %user,
            location = %meta.location,
            size = meta.size,
            content_type,
            "Artifact stored and published"
        );

        Ok(IngestReceipt {
            name: meta.name,
            location: meta.location,
            url,
            message_id,
        })
    }
}
