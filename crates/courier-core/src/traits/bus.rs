//! Publish/subscribe message bus abstraction.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::result::AppResult;

/// A message delivered to a subscription.
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// Bus-assigned message id (stable across redeliveries).
    pub id: String,
    /// Handle used to acknowledge this delivery.
    pub ack_id: String,
    /// Opaque payload.
    pub data: Bytes,
    /// When the message was published.
    pub published_at: DateTime<Utc>,
    /// 1 for the first delivery, incremented on each redelivery.
    pub delivery_attempt: u32,
}

/// Durable topics with disposable, fan-out subscriptions and explicit
/// acknowledgment.
///
/// Every subscription bound to a topic receives its own copy of each
/// message published after the subscription was created.
#[async_trait]
pub trait MessageBus: Send + Sync + std::fmt::Debug + 'static {
    /// Returns the provider name (e.g. `"memory"`, `"redis"`).
    fn provider_type(&self) -> &str;

    /// Create a topic. Fails with [`ErrorKind::Conflict`](crate::error::ErrorKind::Conflict)
    /// when the topic already exists.
    async fn create_topic(&self, topic: &str) -> AppResult<()>;

    /// Whether a topic exists.
    async fn topic_exists(&self, topic: &str) -> AppResult<bool>;

    /// Publish a payload to every subscription of `topic`. Returns the message id.
    async fn publish(&self, topic: &str, data: Bytes) -> AppResult<String>;

    /// Create a new subscription bound to `topic`.
    async fn create_subscription(&self, subscription: &str, topic: &str) -> AppResult<()>;

    /// Delete a subscription. Fails with
    /// [`ErrorKind::NotFound`](crate::error::ErrorKind::NotFound) if it does not exist.
    async fn delete_subscription(&self, subscription: &str) -> AppResult<()>;

    /// Wait for the next delivery on a subscription.
    ///
    /// Returns `Ok(None)` once the subscription has been deleted. The
    /// returned future is cancel-safe: dropping it loses no message.
    async fn receive(&self, subscription: &str) -> AppResult<Option<BusMessage>>;

    /// Acknowledge a delivery so it is not redelivered.
    async fn ack(&self, subscription: &str, ack_id: &str) -> AppResult<()>;

    /// Reject a delivery, making it eligible for redelivery.
    async fn nack(&self, subscription: &str, ack_id: &str) -> AppResult<()>;
}
