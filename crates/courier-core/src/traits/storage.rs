//! Artifact storage abstraction.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// Metadata describing one stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Original name supplied by the uploader.
    pub name: String,
    /// MIME content type.
    pub content_type: String,
    /// When the artifact was stored.
    pub created_at: DateTime<Utc>,
    /// Storage location, relative to the store root.
    pub location: String,
    /// Size in bytes.
    pub size: u64,
}

/// Lazily produced artifact listing.
pub type ArtifactStream = Pin<Box<dyn Stream<Item = AppResult<ArtifactMeta>> + Send>>;

/// Object storage for uploaded artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync + std::fmt::Debug + 'static {
    /// Returns the provider name.
    fn provider_type(&self) -> &str;

    /// Store `data` at `location` with the given name and content type.
    async fn write(
        &self,
        location: &str,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> AppResult<ArtifactMeta>;

    /// Lazily list artifacts whose location starts with `prefix`, in
    /// ascending location order.
    async fn list_by_prefix(&self, prefix: &str) -> AppResult<ArtifactStream>;

    /// Read an artifact's bytes.
    async fn read(&self, location: &str) -> AppResult<Bytes>;

    /// Public URL under which `location` is served.
    fn public_url(&self, location: &str) -> String;
}
