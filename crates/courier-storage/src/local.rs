//! Local filesystem artifact store.
//!
//! Each artifact is two files: the content at `<location>` and a JSON
//! sidecar at `<location>.meta.json` carrying its name and content type.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{StreamExt, stream};
use tokio::fs;
use tracing::{debug, warn};

use courier_core::config::StorageConfig;
use courier_core::error::{AppError, ErrorKind};
use courier_core::result::AppResult;
use courier_core::traits::storage::{ArtifactMeta, ArtifactStore, ArtifactStream};

/// Suffix of the metadata sidecar written next to every artifact.
const META_SUFFIX: &str = ".meta.json";

/// Local filesystem artifact store.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    /// Root directory for all stored artifacts.
    root: PathBuf,
    /// Base URL the artifacts are served from.
    public_base_url: String,
}

impl LocalArtifactStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: &str, public_base_url: &str) -> AppResult<Self> {
        let root = PathBuf::from(root);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a store from configuration.
    pub async fn from_config(config: &StorageConfig) -> AppResult<Self> {
        Self::new(&config.root, &config.public_base_url).await
    }

    /// Resolve a relative location to a path within the root.
    ///
    /// Absolute components and `..` are rejected so a location can never
    /// escape the root.
    fn resolve(&self, location: &str) -> AppResult<PathBuf> {
        let clean = Path::new(location.trim_start_matches('/'));
        if clean
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(AppError::validation(format!(
                "Invalid storage location: {location}"
            )));
        }
        Ok(self.root.join(clean))
    }

    /// Ensure the parent directory of a path exists.
    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(META_SUFFIX);
    PathBuf::from(name)
}

/// Reads one sidecar; `None` when the entry is not a sidecar.
async fn read_sidecar(path: &Path) -> Option<AppResult<ArtifactMeta>> {
    let file_name = path.file_name()?.to_str()?;
    if !file_name.ends_with(META_SUFFIX) {
        return None;
    }
    let result = match fs::read(path).await {
        Ok(raw) => serde_json::from_slice::<ArtifactMeta>(&raw).map_err(AppError::from),
        Err(e) => Err(AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to read metadata: {}", path.display()),
            e,
        )),
    };
    Some(result)
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn write(
        &self,
        location: &str,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> AppResult<ArtifactMeta> {
        let full_path = self.resolve(location)?;
        self.ensure_parent(&full_path).await?;

        fs::write(&full_path, &data).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to write artifact: {location}"),
                e,
            )
        })?;

        let meta = ArtifactMeta {
            name: name.to_string(),
            content_type: content_type.to_string(),
            created_at: Utc::now(),
            location: location.trim_start_matches('/').to_string(),
            size: data.len() as u64,
        };
        fs::write(sidecar_path(&full_path), serde_json::to_vec(&meta)?)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to write metadata: {location}"),
                    e,
                )
            })?;

        debug!(location, bytes = data.len(), "Stored artifact");
        Ok(meta)
    }

    async fn list_by_prefix(&self, prefix: &str) -> AppResult<ArtifactStream> {
        let dir_path = self.resolve(prefix)?;
        let mut dir = match fs::read_dir(&dir_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Box::pin(stream::empty()));
            }
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to list artifacts: {prefix}"),
                    e,
                ));
            }
        };

        // Directory order is unspecified; listings are in location order so
        // stamped locations come out oldest first.
        let mut sidecars = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to read directory entry", e)
        })? {
            let path = entry.path();
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(META_SUFFIX))
            {
                sidecars.push(path);
            }
        }
        sidecars.sort();

        let listing = stream::iter(sidecars).filter_map(|path| async move {
            match read_sidecar(&path).await? {
                Ok(meta) => Some(Ok(meta)),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable artifact metadata");
                    None
                }
            }
        });

        Ok(Box::pin(listing))
    }

    async fn read(&self, location: &str) -> AppResult<Bytes> {
        let full_path = self.resolve(location)?;
        let data = fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Artifact not found: {location}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read artifact: {location}"),
                    e,
                )
            }
        })?;
        Ok(Bytes::from(data))
    }

    fn public_url(&self, location: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url,
            location.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;

    async fn store(dir: &tempfile::TempDir) -> LocalArtifactStore {
        LocalArtifactStore::new(dir.path().to_str().unwrap(), "http://files.test/a/")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        let meta = store
            .write("abc/0001", "notes.txt", "text/plain", Bytes::from("hello"))
            .await
            .unwrap();
        assert_eq!(meta.location, "abc/0001");
        assert_eq!(meta.size, 5);

        let data = store.read("abc/0001").await.unwrap();
        assert_eq!(data, Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(&dir).await.read("abc/missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_by_prefix_only_sees_that_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        store
            .write("alice/01", "a.txt", "text/plain", Bytes::from("a"))
            .await
            .unwrap();
        store
            .write("alice/02", "b.png", "image/png", Bytes::from("b"))
            .await
            .unwrap();
        store
            .write("bob/01", "c.txt", "text/plain", Bytes::from("c"))
            .await
            .unwrap();

        let mut listed: Vec<ArtifactMeta> = store
            .list_by_prefix("alice")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        listed.sort_by(|a, b| a.location.cmp(&b.location));

        let names: Vec<&str> = listed.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.png"]);
        assert_eq!(listed[1].content_type, "image/png");
    }

    #[tokio::test]
    async fn test_listing_is_in_location_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        // Written out of order on purpose.
        for i in [7u64, 2, 19, 0, 11, 5, 13, 3] {
            store
                .write(&format!("alice/{i:016x}"), &format!("n{i:02}"), "text/plain", Bytes::new())
                .await
                .unwrap();
        }

        let listed: Vec<ArtifactMeta> = store
            .list_by_prefix("alice")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let names: Vec<&str> = listed.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["n00", "n02", "n03", "n05", "n07", "n11", "n13", "n19"]);
    }

    #[tokio::test]
    async fn test_list_unknown_prefix_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let listed: Vec<ArtifactMeta> = store(&dir)
            .await
            .list_by_prefix("nobody")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_parent_components_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        let err = store
            .write("../escape", "x", "text/plain", Bytes::from("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_public_url_joins_base() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        assert_eq!(store.public_url("abc/0001"), "http://files.test/a/abc/0001");
    }
}
