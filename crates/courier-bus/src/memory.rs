//! In-process message bus for single-node deployments.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Notify;
use tracing::debug;

use courier_core::error::AppError;
use courier_core::result::AppResult;
use courier_core::traits::bus::{BusMessage, MessageBus};

/// One subscription's delivery state.
#[derive(Debug)]
struct SubscriptionQueue {
    /// Topic this subscription is bound to.
    topic: String,
    /// Messages waiting for delivery, oldest first.
    pending: Mutex<VecDeque<BusMessage>>,
    /// Delivered but not yet acknowledged, keyed by ack id.
    in_flight: DashMap<String, BusMessage>,
    /// Wakes the receiver on publish, nack, or deletion.
    notify: Notify,
    /// Set once the subscription is deleted.
    closed: AtomicBool,
}

impl SubscriptionQueue {
    fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            pending: Mutex::new(VecDeque::new()),
            in_flight: DashMap::new(),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn push_back(&self, msg: BusMessage) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push_back(msg);
        }
        self.notify.notify_one();
    }

    fn push_front(&self, msg: BusMessage) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push_front(msg);
        }
        self.notify.notify_one();
    }

    /// Takes the next pending message and marks it in flight.
    fn take(&self) -> Option<BusMessage> {
        let mut msg = self.pending.lock().ok()?.pop_front()?;
        msg.delivery_attempt += 1;
        msg.ack_id = format!("{}-{}", msg.id, msg.delivery_attempt);
        self.in_flight.insert(msg.ack_id.clone(), msg.clone());
        Some(msg)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// In-memory bus.
///
/// Topics are plain names; each subscription owns a FIFO queue that every
/// publish to its topic appends to, so subscriptions see independent copies.
/// Unacknowledged deliveries return to the head of the queue on `nack`.
#[derive(Debug, Default)]
pub struct MemoryBus {
    /// Topic name → subscription names.
    topics: DashMap<String, HashSet<String>>,
    /// Subscription name → queue.
    subscriptions: DashMap<String, Arc<SubscriptionQueue>>,
    /// Message id sequence.
    sequence: AtomicU64,
}

impl MemoryBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether a subscription exists.
    pub fn has_subscription(&self, subscription: &str) -> bool {
        self.subscriptions.contains_key(subscription)
    }

    /// Delivered but unacknowledged messages on a subscription.
    pub fn in_flight_count(&self, subscription: &str) -> usize {
        self.subscriptions
            .get(subscription)
            .map(|q| q.in_flight.len())
            .unwrap_or(0)
    }

    fn queue(&self, subscription: &str) -> AppResult<Arc<SubscriptionQueue>> {
        self.subscriptions
            .get(subscription)
            .map(|q| Arc::clone(q.value()))
            .ok_or_else(|| AppError::not_found(format!("Subscription '{subscription}' not found")))
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn create_topic(&self, topic: &str) -> AppResult<()> {
        match self.topics.entry(topic.to_string()) {
            Entry::Occupied(_) => {
                Err(AppError::conflict(format!("Topic '{topic}' already exists")))
            }
            Entry::Vacant(slot) => {
                slot.insert(HashSet::new());
                debug!(topic, "Topic created");
                Ok(())
            }
        }
    }

    async fn topic_exists(&self, topic: &str) -> AppResult<bool> {
        Ok(self.topics.contains_key(topic))
    }

    async fn publish(&self, topic: &str, data: Bytes) -> AppResult<String> {
        let subscribers: Vec<String> = self
            .topics
            .get(topic)
            .map(|subs| subs.iter().cloned().collect())
            .ok_or_else(|| AppError::not_found(format!("Topic '{topic}' not found")))?;

        let id = format!("{:016x}", self.sequence.fetch_add(1, Ordering::SeqCst));
        let msg = BusMessage {
            id: id.clone(),
            ack_id: String::new(),
            data,
            published_at: Utc::now(),
            delivery_attempt: 0,
        };

        for name in &subscribers {
            if let Some(queue) = self.subscriptions.get(name).map(|q| Arc::clone(q.value())) {
                queue.push_back(msg.clone());
            }
        }

        debug!(topic, id = %id, fan_out = subscribers.len(), "Message published");
        Ok(id)
    }

    async fn create_subscription(&self, subscription: &str, topic: &str) -> AppResult<()> {
        if !self.topics.contains_key(topic) {
            return Err(AppError::not_found(format!("Topic '{topic}' not found")));
        }
        match self.subscriptions.entry(subscription.to_string()) {
            Entry::Occupied(_) => {
                return Err(AppError::conflict(format!(
                    "Subscription '{subscription}' already exists"
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(SubscriptionQueue::new(topic)));
            }
        }
        if let Some(mut subs) = self.topics.get_mut(topic) {
            subs.insert(subscription.to_string());
        }
        debug!(subscription, topic, "Subscription created");
        Ok(())
    }

    async fn delete_subscription(&self, subscription: &str) -> AppResult<()> {
        let (_, queue) = self.subscriptions.remove(subscription).ok_or_else(|| {
            AppError::not_found(format!("Subscription '{subscription}' not found"))
        })?;
        if let Some(mut subs) = self.topics.get_mut(&queue.topic) {
            subs.remove(subscription);
        }
        queue.close();
        debug!(subscription, "Subscription deleted");
        Ok(())
    }

    async fn receive(&self, subscription: &str) -> AppResult<Option<BusMessage>> {
        let queue = self.queue(subscription)?;
        loop {
            if queue.is_closed() {
                return Ok(None);
            }
            if let Some(msg) = queue.take() {
                return Ok(Some(msg));
            }
            queue.notify.notified().await;
        }
    }

    async fn ack(&self, subscription: &str, ack_id: &str) -> AppResult<()> {
        let queue = self.queue(subscription)?;
        if queue.in_flight.remove(ack_id).is_none() {
            debug!(subscription, ack_id, "Ack for unknown delivery ignored");
        }
        Ok(())
    }

    async fn nack(&self, subscription: &str, ack_id: &str) -> AppResult<()> {
        let queue = self.queue(subscription)?;
        if let Some((_, msg)) = queue.in_flight.remove(ack_id) {
            queue.push_front(msg);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn bus_with_topic(topic: &str) -> MemoryBus {
        let bus = MemoryBus::new();
        bus.create_topic(topic).await.unwrap();
        bus
    }

    #[tokio::test]
    async fn test_create_topic_twice_conflicts() {
        let bus = bus_with_topic("t").await;
        let err = bus.create_topic("t").await.unwrap_err();
        assert!(err.is_conflict());
        assert!(bus.topic_exists("t").await.unwrap());
        assert!(!bus.topic_exists("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_publish_to_missing_topic() {
        let bus = MemoryBus::new();
        let err = bus.publish("nope", Bytes::from("x")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_fan_out_to_every_subscription() {
        let bus = bus_with_topic("t").await;
        bus.create_subscription("a", "t").await.unwrap();
        bus.create_subscription("b", "t").await.unwrap();

        bus.publish("t", Bytes::from("hello")).await.unwrap();

        let a = bus.receive("a").await.unwrap().unwrap();
        let b = bus.receive("b").await.unwrap().unwrap();
        assert_eq!(a.data, Bytes::from("hello"));
        assert_eq!(b.data, Bytes::from("hello"));
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_messages_before_subscription_are_not_delivered() {
        let bus = bus_with_topic("t").await;
        bus.publish("t", Bytes::from("early")).await.unwrap();
        bus.create_subscription("a", "t").await.unwrap();
        bus.publish("t", Bytes::from("late")).await.unwrap();

        let msg = bus.receive("a").await.unwrap().unwrap();
        assert_eq!(msg.data, Bytes::from("late"));
    }

    #[tokio::test]
    async fn test_order_is_preserved() {
        let bus = bus_with_topic("t").await;
        bus.create_subscription("a", "t").await.unwrap();
        for i in 0..5 {
            bus.publish("t", Bytes::from(format!("m{i}"))).await.unwrap();
        }
        for i in 0..5 {
            let msg = bus.receive("a").await.unwrap().unwrap();
            assert_eq!(msg.data, Bytes::from(format!("m{i}")));
            bus.ack("a", &msg.ack_id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_receive_waits_for_publish() {
        let bus = Arc::new(bus_with_topic("t").await);
        bus.create_subscription("a", "t").await.unwrap();

        let receiver = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move { bus.receive("a").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.publish("t", Bytes::from("wake")).await.unwrap();

        let msg = receiver.await.unwrap().unwrap().unwrap();
        assert_eq!(msg.data, Bytes::from("wake"));
    }

    #[tokio::test]
    async fn test_nack_redelivers_first() {
        let bus = bus_with_topic("t").await;
        bus.create_subscription("a", "t").await.unwrap();
        bus.publish("t", Bytes::from("one")).await.unwrap();
        bus.publish("t", Bytes::from("two")).await.unwrap();

        let first = bus.receive("a").await.unwrap().unwrap();
        assert_eq!(first.delivery_attempt, 1);
        bus.nack("a", &first.ack_id).await.unwrap();

        let again = bus.receive("a").await.unwrap().unwrap();
        assert_eq!(again.data, Bytes::from("one"));
        assert_eq!(again.delivery_attempt, 2);
        assert_ne!(again.ack_id, first.ack_id);
    }

    #[tokio::test]
    async fn test_delete_wakes_receiver_with_none() {
        let bus = Arc::new(bus_with_topic("t").await);
        bus.create_subscription("a", "t").await.unwrap();

        let receiver = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move { bus.receive("a").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.delete_subscription("a").await.unwrap();

        assert!(receiver.await.unwrap().unwrap().is_none());
        assert!(!bus.has_subscription("a"));
    }

    #[tokio::test]
    async fn test_delete_missing_subscription_is_not_found() {
        let bus = bus_with_topic("t").await;
        bus.create_subscription("a", "t").await.unwrap();
        bus.delete_subscription("a").await.unwrap();

        let err = bus.delete_subscription("a").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_deleted_subscription_no_longer_receives_publishes() {
        let bus = bus_with_topic("t").await;
        bus.create_subscription("a", "t").await.unwrap();
        bus.create_subscription("b", "t").await.unwrap();
        bus.delete_subscription("a").await.unwrap();

        bus.publish("t", Bytes::from("x")).await.unwrap();
        assert_eq!(bus.subscription_count(), 1);
        assert!(bus.receive("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_subscription_conflicts() {
        let bus = bus_with_topic("t").await;
        bus.create_subscription("a", "t").await.unwrap();
        let err = bus.create_subscription("a", "t").await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_subscription_requires_topic() {
        let bus = MemoryBus::new();
        let err = bus.create_subscription("a", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
