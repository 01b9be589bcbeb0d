//! Message bus configuration.

use serde::{Deserialize, Serialize};

/// Message bus provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Provider: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Redis connection URL (redis provider only).
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Key namespace for all bus keys in Redis.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Prefix of per-user topic names.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Prefix of per-connection subscription names.
    #[serde(default = "default_subscription_prefix")]
    pub subscription_prefix: String,
    /// Timeout for topic/subscription management calls, in seconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_seconds: u64,
    /// How long one blocking receive waits before polling again, in milliseconds.
    #[serde(default = "default_receive_block")]
    pub receive_block_ms: u64,
    /// Approximate cap on entries kept per topic stream (redis provider only).
    #[serde(default = "default_stream_max_len")]
    pub stream_max_len: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
            topic_prefix: default_topic_prefix(),
            subscription_prefix: default_subscription_prefix(),
            operation_timeout_seconds: default_operation_timeout(),
            receive_block_ms: default_receive_block(),
            stream_max_len: default_stream_max_len(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    "courier:".to_string()
}

fn default_topic_prefix() -> String {
    "notifications".to_string()
}

fn default_subscription_prefix() -> String {
    "listen".to_string()
}

fn default_operation_timeout() -> u64 {
    10
}

fn default_receive_block() -> u64 {
    5000
}

fn default_stream_max_len() -> u64 {
    1000
}
