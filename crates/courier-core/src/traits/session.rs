//! Session persistence abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// A persisted login session, keyed by `token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque session token.
    pub token: String,
    /// Subject of the verified identity.
    pub user: String,
    /// Email of the verified identity.
    pub email: String,
    /// When the session was issued.
    pub created_at: DateTime<Utc>,
    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Whether the session has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Storage backend for session records.
#[async_trait]
pub trait SessionRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Persist a new session.
    async fn insert(&self, record: &SessionRecord) -> AppResult<()>;

    /// Find a session by token.
    async fn find(&self, token: &str) -> AppResult<Option<SessionRecord>>;

    /// Delete a session by token. Returns whether a record was removed.
    async fn delete(&self, token: &str) -> AppResult<bool>;

    /// Delete every session expired at `now`. Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;
}
