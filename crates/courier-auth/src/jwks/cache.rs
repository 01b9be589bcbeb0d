//! Process-wide signing-key cache keyed by issuer endpoint.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use tracing::{debug, info};

use super::key::KeySet;
use super::provider::KeyProvider;
use crate::error::AuthError;

/// Wraps a [`KeyProvider`] with a TTL cache.
///
/// Concurrent misses for the same endpoint share a single fetch. A key-id
/// miss in the verifier triggers [`KeyProvider::refresh`], which drops the
/// cached entry and fetches again, at most once per refresh interval;
/// inside the interval the cached set is returned.
#[derive(Clone)]
pub struct CachedKeyProvider {
    /// Upstream provider.
    inner: Arc<dyn KeyProvider>,
    /// Key sets keyed by endpoint URL.
    cache: Cache<String, KeySet>,
    /// Minimum spacing of forced refreshes.
    min_refresh_interval: Duration,
    /// When the last forced refresh went upstream.
    last_refresh: Arc<Mutex<Option<Instant>>>,
}

/// Default minimum spacing of forced refreshes.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

impl std::fmt::Debug for CachedKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedKeyProvider")
            .field("source", &self.inner.source())
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl CachedKeyProvider {
    /// Caches key sets from `inner` for `ttl`.
    pub fn new(inner: Arc<dyn KeyProvider>, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(16).time_to_live(ttl).build();
        Self {
            inner,
            cache,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            last_refresh: Arc::new(Mutex::new(None)),
        }
    }

    /// Sets the minimum spacing of forced refreshes.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Claims the refresh slot if the last refresh is old enough.
    fn try_claim_refresh(&self) -> bool {
        let mut last = self
            .last_refresh
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.min_refresh_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Drops the cached key set so the next call fetches.
    pub async fn invalidate(&self) {
        self.cache.invalidate(self.inner.source()).await;
        info!(source = %self.inner.source(), "Signing key cache invalidated");
    }
}

#[async_trait]
impl KeyProvider for CachedKeyProvider {
    fn source(&self) -> &str {
        self.inner.source()
    }

    async fn fetch(&self) -> Result<KeySet, AuthError> {
        let inner = Arc::clone(&self.inner);
        self.cache
            .try_get_with(self.inner.source().to_string(), async move {
                inner.fetch().await
            })
            .await
            .map_err(|e| (*e).clone())
    }

    async fn refresh(&self) -> Result<KeySet, AuthError> {
        if !self.try_claim_refresh() {
            debug!(source = %self.inner.source(), "Signing keys refreshed recently, using cached set");
            return self.fetch().await;
        }
        debug!(source = %self.inner.source(), "Refreshing signing keys after key-id miss");
        self.invalidate().await;
        self.fetch().await
    }
}
