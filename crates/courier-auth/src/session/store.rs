//! Session issue, lookup, and expiry over a [`SessionRepository`].

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use courier_core::config::SessionConfig;
use courier_core::result::AppResult;
use courier_core::traits::session::{SessionRecord, SessionRepository};
use courier_core::types::VerifiedIdentity;

/// Random bytes per session token.
const TOKEN_BYTES: usize = 32;

/// Outcome of resolving a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    /// The session exists and is valid.
    Active(VerifiedIdentity),
    /// No session has this token.
    NotFound,
    /// The session exists but has expired.
    Expired,
}

/// A freshly issued session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    /// Opaque bearer token.
    pub token: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

/// Session operations used by the HTTP layer and the relay.
#[derive(Debug, Clone)]
pub struct SessionStore {
    /// Persistence backend.
    repo: Arc<dyn SessionRepository>,
    /// Session lifetime.
    ttl: Duration,
}

impl SessionStore {
    /// Creates a new session store.
    pub fn new(repo: Arc<dyn SessionRepository>, config: &SessionConfig) -> Self {
        Self {
            repo,
            ttl: Duration::minutes(config.ttl_minutes),
        }
    }

    /// Issues a new session for a verified identity.
    pub async fn issue(&self, identity: &VerifiedIdentity) -> AppResult<IssuedSession> {
        let now = Utc::now();
        let record = SessionRecord {
            token: generate_token(),
            user: identity.subject.clone(),
            email: identity.email.clone(),
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.repo.insert(&record).await?;

        debug!(user_hash = %identity.user_hash(), "Session issued");
        Ok(IssuedSession {
            token: record.token,
            expires_at: record.expires_at,
        })
    }

    /// Resolves a session token.
    pub async fn resolve(&self, token: &str) -> AppResult<SessionLookup> {
        self.resolve_at(token, Utc::now()).await
    }

    /// Resolves a session token as of `now`.
    pub async fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> AppResult<SessionLookup> {
        let Some(record) = self.repo.find(token).await? else {
            return Ok(SessionLookup::NotFound);
        };
        if record.is_expired_at(now) {
            return Ok(SessionLookup::Expired);
        }
        Ok(SessionLookup::Active(VerifiedIdentity::new(
            record.user,
            record.email,
        )))
    }

    /// Ends a session. Returns whether it existed.
    pub async fn revoke(&self, token: &str) -> AppResult<bool> {
        self.repo.delete(token).await
    }

    /// Deletes all expired sessions. Returns the number removed.
    pub async fn delete_expired(&self) -> AppResult<u64> {
        let removed = self.repo.delete_expired(Utc::now()).await?;
        if removed > 0 {
            info!(count = removed, "Expired sessions deleted");
        }
        Ok(removed)
    }
}

/// 32 random bytes, base64url without padding (cookie-safe).
fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}
