//! Identity claims carried in the token payload.

use base64::Engine;
use serde::{Deserialize, Serialize};

use courier_core::types::VerifiedIdentity;

use super::BASE64URL;
use crate::error::AuthError;

/// Claims asserted by the issuer. Only constructed after the signature
/// has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Stable subject identifier.
    #[serde(rename = "sub")]
    pub subject: String,
    /// Email address, empty when the scope did not include it.
    #[serde(default)]
    pub email: String,
    /// Issuing authority.
    #[serde(rename = "iss")]
    pub issuer: String,
    /// Intended audience (client id).
    #[serde(rename = "aud")]
    pub audience: String,
    /// Issued-at, epoch seconds.
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Expiry, epoch seconds.
    #[serde(rename = "exp")]
    pub expiry: i64,
}

impl IdentityClaims {
    /// Decode the base64url payload section.
    pub(crate) fn decode(section: &str) -> Result<Self, AuthError> {
        let raw = BASE64URL
            .decode(section)
            .map_err(|e| AuthError::MalformedToken(format!("payload encoding: {e}")))?;
        serde_json::from_slice(&raw)
            .map_err(|e| AuthError::MalformedToken(format!("payload json: {e}")))
    }

    /// The `(subject, email)` pair handed to the rest of the system.
    pub fn identity(&self) -> VerifiedIdentity {
        VerifiedIdentity::new(self.subject.clone(), self.email.clone())
    }
}
