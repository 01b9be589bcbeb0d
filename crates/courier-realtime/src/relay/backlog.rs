//! One-shot replay of a user's stored artifacts onto a new connection.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, warn};

use courier_core::traits::storage::{ArtifactMeta, ArtifactStore};
use courier_core::types::UserHash;

use super::frame::Outbound;
use super::writer::ConnectionWriter;
use crate::error::RelayError;
use crate::message::{CLIPBOARD_TYPE, FileNotification};
use crate::metrics::RelayMetrics;

/// Replays up to `max_items` stored artifacts as notifications.
#[derive(Debug, Clone)]
pub struct BacklogReplayer {
    store: Arc<dyn ArtifactStore>,
    max_items: usize,
    metrics: Arc<RelayMetrics>,
}

impl BacklogReplayer {
    /// Creates a replayer reading from `store`.
    pub fn new(store: Arc<dyn ArtifactStore>, max_items: usize, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            store,
            max_items,
            metrics,
        }
    }

    /// Writes `user`'s most recent `max_items` artifacts, oldest first,
    /// through `writer`.
    ///
    /// Unreadable entries are skipped. Returns the number written.
    pub async fn replay(
        &self,
        user: &UserHash,
        writer: &ConnectionWriter,
    ) -> Result<usize, RelayError> {
        let mut listing = self.store.list_by_prefix(user.as_str()).await?;
        let mut items: Vec<ArtifactMeta> = Vec::new();
        while let Some(entry) = listing.next().await {
            match entry {
                Ok(meta) => items.push(meta),
                Err(e) => warn!(user_hash = %user, error = %e, "Skipping backlog entry"),
            }
        }
        items.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.location.cmp(&b.location))
        });
        let items = items.split_off(items.len().saturating_sub(self.max_items));

        let mut written = 0;
        for meta in &items {
            let content = if meta.content_type == CLIPBOARD_TYPE {
                match self.store.read(&meta.location).await {
                    Ok(data) => Some(data),
                    Err(e) => {
                        warn!(location = %meta.location, error = %e, "Skipping unreadable backlog artifact");
                        continue;
                    }
                }
            } else {
                None
            };

            let note = FileNotification::for_artifact(
                meta,
                self.store.public_url(&meta.location),
                content.as_deref(),
            );
            writer.write(Outbound::Payload(note.to_payload()?)).await?;
            RelayMetrics::incr(&self.metrics.backlog_replayed);
            written += 1;
        }

        debug!(user_hash = %user, count = written, "Backlog replayed");
        Ok(written)
    }
}
