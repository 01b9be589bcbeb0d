//! Real-time relay configuration.

use serde::{Deserialize, Serialize};

/// Real-time relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of the per-connection channel feeding the writer task.
    #[serde(default = "default_writer_buffer")]
    pub writer_buffer: usize,
    /// How long a socket peer has to send its identity token, in seconds.
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_seconds: u64,
    /// Backlog replay before steady-state delivery.
    #[serde(default)]
    pub backlog: BacklogConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            writer_buffer: default_writer_buffer(),
            auth_timeout_seconds: default_auth_timeout(),
            backlog: BacklogConfig::default(),
        }
    }
}

/// One-shot catch-up replay of stored artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacklogConfig {
    /// Whether to replay stored artifacts when a connection attaches.
    #[serde(default)]
    pub enabled: bool,
    /// Upper bound on replayed artifacts per connection.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

impl Default for BacklogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_items: default_max_items(),
        }
    }
}

fn default_writer_buffer() -> usize {
    64
}

fn default_auth_timeout() -> u64 {
    10
}

fn default_max_items() -> usize {
    50
}
