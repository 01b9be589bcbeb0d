//! Upload framing for the socket and HTTP ingest paths.

use serde::{Deserialize, Serialize};

/// Header frame preceding an uploaded body on the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UploadHeader {
    /// Artifact name.
    pub name: String,
    /// Content type.
    #[serde(rename = "Type")]
    pub content_type: String,
    /// Session token, present only on the HTTP upload path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Receipt written back to the uploading socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Always `"stored"`.
    pub status: String,
    /// Artifact name.
    pub name: String,
    /// Storage location.
    pub location: String,
}

impl UploadReceipt {
    /// Receipt for a stored artifact.
    pub fn stored(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            status: "stored".to_string(),
            name: name.into(),
            location: location.into(),
        }
    }
}
