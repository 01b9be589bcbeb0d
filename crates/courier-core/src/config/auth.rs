//! Identity token verification configuration.

use serde::{Deserialize, Serialize};

/// Settings for verifying signed identity tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Expected `aud` claim (the sign-in application's client id).
    #[serde(default)]
    pub audience: String,
    /// Accepted `iss` claim values.
    #[serde(default = "default_accepted_issuers")]
    pub accepted_issuers: Vec<String>,
    /// Published key-set endpoint.
    #[serde(default = "default_jwks_url")]
    pub jwks_url: String,
    /// How long a fetched key set stays cached, in seconds.
    #[serde(default = "default_key_cache_ttl")]
    pub key_cache_ttl_seconds: u64,
    /// Timeout for a single key-set fetch, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub key_fetch_timeout_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            audience: String::new(),
            accepted_issuers: default_accepted_issuers(),
            jwks_url: default_jwks_url(),
            key_cache_ttl_seconds: default_key_cache_ttl(),
            key_fetch_timeout_seconds: default_fetch_timeout(),
        }
    }
}

fn default_accepted_issuers() -> Vec<String> {
    vec![
        "accounts.google.com".to_string(),
        "https://accounts.google.com".to_string(),
    ]
}

fn default_jwks_url() -> String {
    "https://www.googleapis.com/oauth2/v3/certs".to_string()
}

fn default_key_cache_ttl() -> u64 {
    3600
}

fn default_fetch_timeout() -> u64 {
    10
}
