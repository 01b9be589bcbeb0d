//! Notification payload published for every stored artifact.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use courier_core::result::AppResult;
use courier_core::traits::storage::ArtifactMeta;

/// Content type whose text is inlined into the notification.
pub const CLIPBOARD_TYPE: &str = "text/x-clipboard";

/// The JSON document relayed to a user's connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileNotification {
    /// Original artifact name.
    pub name: String,
    /// Content type.
    #[serde(rename = "Type")]
    pub content_type: String,
    /// Creation time, epoch milliseconds.
    pub created: i64,
    /// Where the artifact can be fetched.
    #[serde(rename = "URL")]
    pub url: String,
    /// Inline text, only for clipboard content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl FileNotification {
    /// Builds the notification for a stored artifact. `content` is inlined
    /// only when the artifact is clipboard text.
    pub fn for_artifact(meta: &ArtifactMeta, url: String, content: Option<&[u8]>) -> Self {
        let body = (meta.content_type == CLIPBOARD_TYPE)
            .then_some(content)
            .flatten()
            .map(|c| String::from_utf8_lossy(c).into_owned());
        Self {
            name: meta.name.clone(),
            content_type: meta.content_type.clone(),
            created: meta.created_at.timestamp_millis(),
            url,
            body,
        }
    }

    /// Serialized payload for the bus.
    pub fn to_payload(&self) -> AppResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}
