//! In-process session repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use courier_core::result::AppResult;
use courier_core::traits::session::{SessionRecord, SessionRepository};

/// Sessions held in a concurrent map. Lost on restart.
#[derive(Debug, Default)]
pub struct MemorySessionRepository {
    /// Sessions keyed by token.
    sessions: DashMap<String, SessionRecord>,
}

impl MemorySessionRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the repository holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn insert(&self, record: &SessionRecord) -> AppResult<()> {
        self.sessions.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn find(&self, token: &str) -> AppResult<Option<SessionRecord>> {
        Ok(self.sessions.get(token).map(|r| r.value().clone()))
    }

    async fn delete(&self, token: &str) -> AppResult<bool> {
        Ok(self.sessions.remove(token).is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut removed = 0u64;
        self.sessions.retain(|_, record| {
            let keep = !record.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
