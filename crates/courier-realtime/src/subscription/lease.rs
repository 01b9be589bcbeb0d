//! Scoped ownership of one connection's subscription.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::manager::SubscriptionManager;

/// Exclusive handle on a connection's subscription.
///
/// The connection lifecycle calls [`release`](Self::release) from a single
/// place once its cancellation token fires. Release deletes the
/// subscription at most once however often it is called. If the lease is
/// dropped unreleased (a panic in the serving task, or an opened connection
/// that was never served), `Drop` schedules the deletion on the runtime.
#[derive(Debug)]
pub struct SubscriptionLease {
    name: String,
    topic: String,
    manager: Arc<SubscriptionManager>,
    released: AtomicBool,
}

impl SubscriptionLease {
    pub(crate) fn new(name: String, topic: String, manager: Arc<SubscriptionManager>) -> Self {
        Self {
            name,
            topic,
            manager,
            released: AtomicBool::new(false),
        }
    }

    /// Subscription name on the bus.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topic the subscription is bound to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether release has already run.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Deletes the subscription. Later calls are no-ops.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            debug!(subscription = %self.name, "Subscription already released");
            return;
        }
        self.manager.delete_subscription(&self.name).await;
    }
}

impl Drop for SubscriptionLease {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                let manager = Arc::clone(&self.manager);
                let name = std::mem::take(&mut self.name);
                handle.spawn(async move {
                    manager.delete_subscription(&name).await;
                });
            }
            Err(_) => {
                warn!(subscription = %self.name, "No runtime to release subscription on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use courier_bus::MemoryBus;
    use courier_core::config::BusConfig;
    use courier_core::result::AppResult;
    use courier_core::traits::bus::{BusMessage, MessageBus};
    use courier_core::types::UserHash;

    use super::*;
    use crate::metrics::RelayMetrics;

    /// Counts deletions on top of the in-memory bus.
    #[derive(Debug, Default)]
    struct CountingBus {
        inner: MemoryBus,
        deletes: AtomicUsize,
    }

    #[async_trait]
    impl MessageBus for CountingBus {
        fn provider_type(&self) -> &str {
            "counting"
        }
        async fn create_topic(&self, topic: &str) -> AppResult<()> {
            self.inner.create_topic(topic).await
        }
        async fn topic_exists(&self, topic: &str) -> AppResult<bool> {
            self.inner.topic_exists(topic).await
        }
        async fn publish(&self, topic: &str, data: Bytes) -> AppResult<String> {
            self.inner.publish(topic, data).await
        }
        async fn create_subscription(&self, subscription: &str, topic: &str) -> AppResult<()> {
            self.inner.create_subscription(subscription, topic).await
        }
        async fn delete_subscription(&self, subscription: &str) -> AppResult<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            self.inner.delete_subscription(subscription).await
        }
        async fn receive(&self, subscription: &str) -> AppResult<Option<BusMessage>> {
            self.inner.receive(subscription).await
        }
        async fn ack(&self, subscription: &str, ack_id: &str) -> AppResult<()> {
            self.inner.ack(subscription, ack_id).await
        }
        async fn nack(&self, subscription: &str, ack_id: &str) -> AppResult<()> {
            self.inner.nack(subscription, ack_id).await
        }
    }

    async fn setup() -> (Arc<CountingBus>, Arc<SubscriptionManager>, String, UserHash) {
        let bus = Arc::new(CountingBus::default());
        let mgr = Arc::new(SubscriptionManager::new(
            bus.clone(),
            &BusConfig::default(),
            Arc::new(RelayMetrics::new()),
        ));
        let user = UserHash::from_subject("u1");
        let topic = mgr.get_or_create_topic(&user).await.unwrap();
        (bus, mgr, topic, user)
    }

    #[tokio::test]
    async fn test_double_release_deletes_once() {
        let (bus, mgr, topic, user) = setup().await;
        let lease = mgr.create_subscription(&topic, &user).await.unwrap();

        lease.release().await;
        lease.release().await;

        assert!(lease.is_released());
        assert_eq!(bus.deletes.load(Ordering::SeqCst), 1);
        assert!(!bus.inner.has_subscription(lease.name()));
    }

    #[tokio::test]
    async fn test_release_does_not_touch_other_connections() {
        let (bus, mgr, topic, user) = setup().await;
        let a = mgr.create_subscription(&topic, &user).await.unwrap();
        let b = mgr.create_subscription(&topic, &user).await.unwrap();

        a.release().await;
        a.release().await;

        assert!(bus.inner.has_subscription(b.name()));
        bus.publish(&topic, Bytes::from("still here")).await.unwrap();
        let msg = bus.receive(b.name()).await.unwrap().unwrap();
        assert_eq!(msg.data, Bytes::from("still here"));

        b.release().await;
        assert_eq!(bus.deletes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_drop_without_release_still_deletes() {
        let (bus, mgr, topic, user) = setup().await;
        let lease = mgr.create_subscription(&topic, &user).await.unwrap();
        let name = lease.name().to_string();

        drop(lease);
        for _ in 0..50 {
            if !bus.inner.has_subscription(&name) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(!bus.inner.has_subscription(&name));
        assert_eq!(bus.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_then_drop_deletes_once() {
        let (bus, mgr, topic, user) = setup().await;
        let lease = mgr.create_subscription(&topic, &user).await.unwrap();

        lease.release().await;
        drop(lease);
        tokio::task::yield_now().await;

        assert_eq!(bus.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_of_externally_deleted_subscription_is_quiet() {
        let (bus, mgr, topic, user) = setup().await;
        let lease = mgr.create_subscription(&topic, &user).await.unwrap();

        bus.inner.delete_subscription(lease.name()).await.unwrap();
        lease.release().await;

        assert!(lease.is_released());
    }
}
