//! Redis Streams message bus for multi-node deployments.
//!
//! Each topic is a stream; each subscription is a consumer group on that
//! stream created at `$`, so it sees only messages published after it was
//! created and every group gets its own copy. Unacknowledged entries stay
//! in the group's pending list and are re-read after a `nack`. Streams are
//! capped near `stream_max_len` entries on every publish.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use dashmap::{DashMap, DashSet};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::streams::StreamReadReply;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

use courier_core::config::BusConfig;
use courier_core::error::{AppError, ErrorKind};
use courier_core::result::AppResult;
use courier_core::traits::bus::{BusMessage, MessageBus};

/// Consumer name used inside every subscription's group.
const CONSUMER: &str = "relay";

/// Redis Streams bus.
pub struct RedisBus {
    /// Client used to open dedicated blocking-read connections.
    client: Client,
    /// Shared connection for non-blocking commands.
    conn: ConnectionManager,
    /// Key namespace.
    key_prefix: String,
    /// BLOCK duration for each read, in milliseconds.
    block_ms: u64,
    /// Approximate per-stream entry cap.
    max_len: u64,
    /// One connection per subscription so blocking reads never stall others.
    readers: DashMap<String, MultiplexedConnection>,
    /// Subscriptions whose pending entries must be re-read first.
    redeliver: DashSet<String>,
    /// Delivery counts of in-flight entries, keyed by `subscription/id`.
    attempts: DashMap<String, u32>,
}

impl std::fmt::Debug for RedisBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBus")
            .field("key_prefix", &self.key_prefix)
            .field("readers", &self.readers.len())
            .finish()
    }
}

fn redis_err(message: &str, e: redis::RedisError) -> AppError {
    AppError::with_source(ErrorKind::Bus, format!("{message}: {e}"), e)
}

/// `XADD <key> MAXLEN ~ <max_len> * data <data> published_at <millis>`
fn xadd_command(key: &str, max_len: u64, data: &[u8], published_at: i64) -> redis::Cmd {
    let mut cmd = redis::cmd("XADD");
    cmd.arg(key)
        .arg("MAXLEN")
        .arg("~")
        .arg(max_len)
        .arg("*")
        .arg("data")
        .arg(data)
        .arg("published_at")
        .arg(published_at);
    cmd
}

impl RedisBus {
    /// Connects to Redis using the bus configuration.
    pub async fn connect(config: &BusConfig) -> AppResult<Self> {
        info!("Connecting message bus to Redis");

        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| redis_err("Failed to create Redis client", e))?;
        let conn = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| redis_err("Failed to connect to Redis", e))?;

        Ok(Self {
            client,
            conn,
            key_prefix: config.key_prefix.clone(),
            block_ms: config.receive_block_ms,
            max_len: config.stream_max_len,
            readers: DashMap::new(),
            redeliver: DashSet::new(),
            attempts: DashMap::new(),
        })
    }

    fn topics_key(&self) -> String {
        format!("{}topics", self.key_prefix)
    }

    fn subscriptions_key(&self) -> String {
        format!("{}subscriptions", self.key_prefix)
    }

    fn stream_key(&self, topic: &str) -> String {
        format!("{}topic:{topic}", self.key_prefix)
    }

    async fn topic_of(&self, subscription: &str) -> AppResult<String> {
        let mut conn = self.conn.clone();
        let topic: Option<String> = conn
            .hget(self.subscriptions_key(), subscription)
            .await
            .map_err(|e| redis_err("HGET failed", e))?;
        topic.ok_or_else(|| AppError::not_found(format!("Subscription '{subscription}' not found")))
    }

    async fn reader(&self, subscription: &str) -> AppResult<MultiplexedConnection> {
        if let Some(conn) = self.readers.get(subscription) {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| redis_err("Failed to open reader connection", e))?;
        self.readers.insert(subscription.to_string(), conn.clone());
        Ok(conn)
    }

    /// One XREADGROUP round. `start` is `">"` for new entries or `"0"` for
    /// this consumer's pending entries.
    async fn read_one(
        &self,
        conn: &mut MultiplexedConnection,
        stream: &str,
        subscription: &str,
        start: &str,
        block: bool,
    ) -> AppResult<Option<BusMessage>> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP").arg(subscription).arg(CONSUMER).arg("COUNT").arg(1);
        if block {
            cmd.arg("BLOCK").arg(self.block_ms);
        }
        cmd.arg("STREAMS").arg(stream).arg(start);

        let reply: Option<StreamReadReply> = cmd
            .query_async(conn)
            .await
            .map_err(|e| redis_err("XREADGROUP failed", e))?;

        let Some(entry) = reply
            .and_then(|r| r.keys.into_iter().next())
            .and_then(|k| k.ids.into_iter().next())
        else {
            return Ok(None);
        };

        let data: Vec<u8> = entry.get("data").unwrap_or_default();
        let published_ms: i64 = entry.get("published_at").unwrap_or_default();
        let published_at = Utc
            .timestamp_millis_opt(published_ms)
            .single()
            .unwrap_or_else(Utc::now);

        let attempt_key = format!("{subscription}/{}", entry.id);
        let mut attempt = self.attempts.entry(attempt_key).or_insert(0);
        *attempt += 1;

        Ok(Some(BusMessage {
            id: entry.id.clone(),
            ack_id: entry.id,
            data: Bytes::from(data),
            published_at,
            delivery_attempt: *attempt,
        }))
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    fn provider_type(&self) -> &str {
        "redis"
    }

    async fn create_topic(&self, topic: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let added: i64 = conn
            .sadd(self.topics_key(), topic)
            .await
            .map_err(|e| redis_err("SADD failed", e))?;
        if added == 0 {
            return Err(AppError::conflict(format!("Topic '{topic}' already exists")));
        }
        debug!(topic, "Topic created");
        Ok(())
    }

    async fn topic_exists(&self, topic: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        conn.sismember(self.topics_key(), topic)
            .await
            .map_err(|e| redis_err("SISMEMBER failed", e))
    }

    async fn publish(&self, topic: &str, data: Bytes) -> AppResult<String> {
        if !self.topic_exists(topic).await? {
            return Err(AppError::not_found(format!("Topic '{topic}' not found")));
        }
        let mut conn = self.conn.clone();
        let id: String = xadd_command(
            &self.stream_key(topic),
            self.max_len,
            data.as_ref(),
            Utc::now().timestamp_millis(),
        )
        .query_async(&mut conn)
            .await
            .map_err(|e| redis_err("XADD failed", e))?;
        debug!(topic, id = %id, "Message published");
        Ok(id)
    }

    async fn create_subscription(&self, subscription: &str, topic: &str) -> AppResult<()> {
        if !self.topic_exists(topic).await? {
            return Err(AppError::not_found(format!("Topic '{topic}' not found")));
        }
        let mut conn = self.conn.clone();
        let claimed: bool = conn
            .hset_nx(self.subscriptions_key(), subscription, topic)
            .await
            .map_err(|e| redis_err("HSETNX failed", e))?;
        if !claimed {
            return Err(AppError::conflict(format!(
                "Subscription '{subscription}' already exists"
            )));
        }

        let created: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(self.stream_key(topic))
            .arg(subscription)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        if let Err(e) = created {
            let _: Result<i64, _> = conn.hdel(self.subscriptions_key(), subscription).await;
            return Err(redis_err("XGROUP CREATE failed", e));
        }

        debug!(subscription, topic, "Subscription created");
        Ok(())
    }

    async fn delete_subscription(&self, subscription: &str) -> AppResult<()> {
        let topic = self.topic_of(subscription).await?;
        let mut conn = self.conn.clone();

        let _: i64 = redis::cmd("XGROUP")
            .arg("DESTROY")
            .arg(self.stream_key(&topic))
            .arg(subscription)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_err("XGROUP DESTROY failed", e))?;
        let _: i64 = conn
            .hdel(self.subscriptions_key(), subscription)
            .await
            .map_err(|e| redis_err("HDEL failed", e))?;

        self.readers.remove(subscription);
        self.redeliver.remove(subscription);
        let prefix = format!("{subscription}/");
        self.attempts.retain(|k, _| !k.starts_with(&prefix));

        debug!(subscription, "Subscription deleted");
        Ok(())
    }

    async fn receive(&self, subscription: &str) -> AppResult<Option<BusMessage>> {
        let topic = self.topic_of(subscription).await?;
        let stream = self.stream_key(&topic);
        let mut conn = self.reader(subscription).await?;

        loop {
            if self.redeliver.contains(subscription) {
                match self
                    .read_one(&mut conn, &stream, subscription, "0", false)
                    .await?
                {
                    Some(msg) => return Ok(Some(msg)),
                    None => {
                        self.redeliver.remove(subscription);
                    }
                }
            }

            match self
                .read_one(&mut conn, &stream, subscription, ">", true)
                .await
            {
                Ok(Some(msg)) => return Ok(Some(msg)),
                Ok(None) => {}
                // NOGROUP: the subscription was deleted while blocked.
                Err(e) if e.message.contains("NOGROUP") => return Ok(None),
                Err(e) => return Err(e),
            }

            let mut shared = self.conn.clone();
            let exists: bool = shared
                .hexists(self.subscriptions_key(), subscription)
                .await
                .map_err(|e| redis_err("HEXISTS failed", e))?;
            if !exists {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, subscription: &str, ack_id: &str) -> AppResult<()> {
        let topic = self.topic_of(subscription).await?;
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .xack(self.stream_key(&topic), subscription, &[ack_id])
            .await
            .map_err(|e| redis_err("XACK failed", e))?;
        self.attempts.remove(&format!("{subscription}/{ack_id}"));
        Ok(())
    }

    async fn nack(&self, subscription: &str, _ack_id: &str) -> AppResult<()> {
        self.redeliver.insert(subscription.to_string());
        Ok(())
    }
}
