//! Relay metrics counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level counters.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Connections ever served
    pub connections_total: AtomicU64,
    /// Connections currently served
    pub connections_active: AtomicU64,
    /// Bus messages written and acknowledged
    pub messages_relayed: AtomicU64,
    /// Writes that failed and tore a connection down
    pub write_failures: AtomicU64,
    /// Subscriptions created
    pub subscriptions_created: AtomicU64,
    /// Subscriptions released
    pub subscriptions_released: AtomicU64,
    /// Subscription deletions that failed
    pub release_failures: AtomicU64,
    /// Uploads stored and published
    pub uploads_ingested: AtomicU64,
    /// Backlog artifacts replayed
    pub backlog_replayed: AtomicU64,
}

impl RelayMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            subscriptions_created: self.subscriptions_created.load(Ordering::Relaxed),
            subscriptions_released: self.subscriptions_released.load(Ordering::Relaxed),
            release_failures: self.release_failures.load(Ordering::Relaxed),
            uploads_ingested: self.uploads_ingested.load(Ordering::Relaxed),
            backlog_replayed: self.backlog_replayed.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub messages_relayed: u64,
    pub write_failures: u64,
    pub subscriptions_created: u64,
    pub subscriptions_released: u64,
    pub release_failures: u64,
    pub uploads_ingested: u64,
    pub backlog_replayed: u64,
}
