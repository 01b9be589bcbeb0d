//! Artifact storage configuration.

use serde::{Deserialize, Serialize};

/// Local artifact storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for stored artifacts.
    #[serde(default = "default_root")]
    pub root: String,
    /// Base URL under which stored artifacts are served.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            public_base_url: default_public_base_url(),
        }
    }
}

fn default_root() -> String {
    "./data/artifacts".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080/artifacts".to_string()
}
