//! Session management configuration.

use serde::{Deserialize, Serialize};

/// Login session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Backend: `"memory"` or `"postgres"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Session lifetime in minutes.
    #[serde(default = "default_ttl")]
    pub ttl_minutes: i64,
    /// Cron expression for the expired-session sweep.
    #[serde(default = "default_cleanup_cron")]
    pub cleanup_cron: String,
    /// Name of the cookie carrying the session token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            ttl_minutes: default_ttl(),
            cleanup_cron: default_cleanup_cron(),
            cookie_name: default_cookie_name(),
        }
    }
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_ttl() -> i64 {
    60
}

fn default_cleanup_cron() -> String {
    "0 */15 * * * *".to_string()
}

fn default_cookie_name() -> String {
    "session".to_string()
}
