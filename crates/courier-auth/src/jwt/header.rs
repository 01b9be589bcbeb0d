//! Token header section.

use base64::Engine;
use serde::Deserialize;

use super::BASE64URL;
use crate::error::AuthError;

/// The fields of the header section used for key selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm, e.g. `RS256`.
    pub alg: String,
    /// Key id. A missing `kid` never matches any key.
    #[serde(default)]
    pub kid: String,
}

impl TokenHeader {
    /// Decode the base64url header section.
    pub fn decode(section: &str) -> Result<Self, AuthError> {
        let raw = BASE64URL
            .decode(section)
            .map_err(|e| AuthError::MalformedToken(format!("header encoding: {e}")))?;
        serde_json::from_slice(&raw)
            .map_err(|e| AuthError::MalformedToken(format!("header json: {e}")))
    }
}
