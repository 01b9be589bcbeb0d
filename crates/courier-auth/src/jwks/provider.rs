//! Signing-key retrieval.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use courier_core::error::{AppError, ErrorKind};
use courier_core::result::AppResult;

use super::key::{KeySet, parse_key_set};
use crate::error::AuthError;

/// Supplies the current signing keys of one issuing authority.
#[async_trait]
pub trait KeyProvider: Send + Sync + std::fmt::Debug + 'static {
    /// The key-set endpoint this provider reads from.
    fn source(&self) -> &str;

    /// Returns the current key set.
    async fn fetch(&self) -> Result<KeySet, AuthError>;

    /// Returns a key set that is not older than this call.
    ///
    /// Used after a key-id miss. Uncached providers simply fetch again.
    async fn refresh(&self) -> Result<KeySet, AuthError> {
        self.fetch().await
    }
}

/// Fetches the key set with one HTTP `GET` per call.
#[derive(Debug, Clone)]
pub struct HttpKeyProvider {
    /// Shared HTTP client.
    client: reqwest::Client,
    /// Key-set endpoint.
    url: String,
}

impl HttpKeyProvider {
    /// Creates a provider for `url`, bounding each fetch by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl KeyProvider for HttpKeyProvider {
    fn source(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<KeySet, AuthError> {
        debug!(url = %self.url, "Fetching signing keys");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!(url = %self.url, error = %e, "Signing key request failed");
                AuthError::KeyFetchFailed(e.to_string())
            })?;

        let body = response
            .bytes()
            .await
            .map_err(|e| AuthError::KeyFetchFailed(e.to_string()))?;

        let keys = parse_key_set(&body)?;
        debug!(url = %self.url, count = keys.len(), "Fetched signing keys");
        Ok(Arc::new(keys))
    }
}
