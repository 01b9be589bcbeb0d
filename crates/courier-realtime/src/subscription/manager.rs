//! Topic get-or-create and unique per-connection subscriptions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use courier_core::config::BusConfig;
use courier_core::error::AppError;
use courier_core::result::AppResult;
use courier_core::traits::bus::MessageBus;
use courier_core::types::UserHash;

use super::lease::SubscriptionLease;
use crate::error::RelayError;
use crate::metrics::RelayMetrics;
use crate::stamp::MonotonicStamp;

/// Provisions the bus resources a connection needs.
///
/// A user has one durable topic shared by all of their connections and by
/// the ingest path. Every connection gets its own subscription on that
/// topic so each sees a full copy of every message.
#[derive(Debug)]
pub struct SubscriptionManager {
    bus: Arc<dyn MessageBus>,
    topic_prefix: String,
    subscription_prefix: String,
    /// Upper bound on topic and subscription create/delete calls.
    op_timeout: Duration,
    stamps: MonotonicStamp,
    metrics: Arc<RelayMetrics>,
}

impl SubscriptionManager {
    /// Creates a manager over `bus`.
    pub fn new(bus: Arc<dyn MessageBus>, config: &BusConfig, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            bus,
            topic_prefix: config.topic_prefix.clone(),
            subscription_prefix: config.subscription_prefix.clone(),
            op_timeout: Duration::from_secs(config.operation_timeout_seconds),
            stamps: MonotonicStamp::new(),
            metrics,
        }
    }

    /// The underlying bus.
    pub fn bus(&self) -> &Arc<dyn MessageBus> {
        &self.bus
    }

    /// Name of the topic holding `user`'s notifications.
    pub fn topic_name(&self, user: &UserHash) -> String {
        format!("{}-{}", self.topic_prefix, user)
    }

    /// Returns `user`'s topic, creating it if needed.
    ///
    /// Creation races between a user's concurrent sessions; losing the race
    /// is not an error.
    pub async fn get_or_create_topic(&self, user: &UserHash) -> Result<String, RelayError> {
        let topic = self.topic_name(user);
        match self
            .bounded("create topic", self.bus.create_topic(&topic))
            .await
        {
            Ok(()) => {
                info!(topic = %topic, "Created topic");
                Ok(topic)
            }
            Err(e) if e.is_conflict() => {
                debug!(topic = %topic, "Topic already exists");
                Ok(topic)
            }
            Err(e) => Err(RelayError::from(e)),
        }
    }

    /// Creates a brand-new subscription on `topic`, owned by the returned
    /// lease.
    pub async fn create_subscription(
        self: &Arc<Self>,
        topic: &str,
        user: &UserHash,
    ) -> Result<SubscriptionLease, RelayError> {
        let name = format!(
            "{}-{}-{:016x}",
            self.subscription_prefix,
            user,
            self.stamps.next()
        );

        self.bounded(
            "create subscription",
            self.bus.create_subscription(&name, topic),
        )
        .await
        .map_err(|e| RelayError::SubscriptionCreateFailed {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;

        RelayMetrics::incr(&self.metrics.subscriptions_created);
        debug!(subscription = %name, topic, "Created subscription");
        Ok(SubscriptionLease::new(name, topic.to_string(), Arc::clone(self)))
    }

    /// Deletes `subscription`. Failures are logged and counted, never
    /// returned.
    pub(crate) async fn delete_subscription(&self, subscription: &str) {
        match self
            .bounded(
                "delete subscription",
                self.bus.delete_subscription(subscription),
            )
            .await
        {
            Ok(()) => {
                RelayMetrics::incr(&self.metrics.subscriptions_released);
                debug!(subscription, "Released subscription");
            }
            Err(e) if e.is_not_found() => {
                RelayMetrics::incr(&self.metrics.subscriptions_released);
                debug!(subscription, "Subscription already gone");
            }
            Err(e) => {
                RelayMetrics::incr(&self.metrics.release_failures);
                warn!(subscription, error = %e, "Failed to release subscription");
            }
        }
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| {
                AppError::timeout(format!(
                    "Bus {operation} timed out after {}s",
                    self.op_timeout.as_secs()
                ))
            })?
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use courier_bus::MemoryBus;

    use super::*;

    fn manager(bus: Arc<MemoryBus>) -> Arc<SubscriptionManager> {
        Arc::new(SubscriptionManager::new(
            bus,
            &BusConfig::default(),
            Arc::new(RelayMetrics::new()),
        ))
    }

    #[tokio::test]
    async fn test_topic_name_uses_subject_hash() {
        let mgr = manager(Arc::new(MemoryBus::new()));
        let user = UserHash::from_subject("u1");
        assert_eq!(mgr.topic_name(&user), format!("notifications-{user}"));
    }

    #[tokio::test]
    async fn test_get_or_create_topic_is_idempotent() {
        let mgr = manager(Arc::new(MemoryBus::new()));
        let user = UserHash::from_subject("u1");

        let first = mgr.get_or_create_topic(&user).await.unwrap();
        let second = mgr.get_or_create_topic(&user).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_topic_creation_both_succeed() {
        let mgr = manager(Arc::new(MemoryBus::new()));
        let user = UserHash::from_subject("u1");

        let (a, b) = tokio::join!(
            mgr.get_or_create_topic(&user),
            mgr.get_or_create_topic(&user)
        );
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn test_subscriptions_are_unique_per_call() {
        let bus = Arc::new(MemoryBus::new());
        let mgr = manager(bus.clone());
        let user = UserHash::from_subject("u1");
        let topic = mgr.get_or_create_topic(&user).await.unwrap();

        let a = mgr.create_subscription(&topic, &user).await.unwrap();
        let b = mgr.create_subscription(&topic, &user).await.unwrap();

        assert_ne!(a.name(), b.name());
        assert!(a.name().starts_with(&format!("listen-{user}-")));
        assert_eq!(bus.subscription_count(), 2);

        a.release().await;
        b.release().await;
    }

    #[tokio::test]
    async fn test_fan_out_to_both_connections() {
        let bus = Arc::new(MemoryBus::new());
        let mgr = manager(bus.clone());
        let user = UserHash::from_subject("u1");
        let topic = mgr.get_or_create_topic(&user).await.unwrap();

        let a = mgr.create_subscription(&topic, &user).await.unwrap();
        let b = mgr.create_subscription(&topic, &user).await.unwrap();
        bus.publish(&topic, Bytes::from("hello")).await.unwrap();

        let got_a = bus.receive(a.name()).await.unwrap().unwrap();
        let got_b = bus.receive(b.name()).await.unwrap().unwrap();
        assert_eq!(got_a.data, Bytes::from("hello"));
        assert_eq!(got_b.data, Bytes::from("hello"));

        a.release().await;
        b.release().await;
    }

    #[tokio::test]
    async fn test_subscription_on_missing_topic_fails_to_create() {
        let mgr = manager(Arc::new(MemoryBus::new()));
        let user = UserHash::from_subject("u1");

        let err = mgr
            .create_subscription("notifications-missing", &user)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::SubscriptionCreateFailed { .. }));
    }
}
