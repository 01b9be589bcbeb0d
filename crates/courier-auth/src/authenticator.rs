//! Identity token authentication: key retrieval plus verification.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use courier_core::types::VerifiedIdentity;

use crate::error::AuthError;
use crate::jwks::KeyProvider;
use crate::jwt::TokenVerifier;

/// Authenticates identity tokens against the issuer's current keys.
///
/// The verifier stays pure; this type owns the key provider and retries
/// once with refreshed keys when the token names an unknown key id.
#[derive(Debug, Clone)]
pub struct IdentityAuthenticator {
    /// Source of signing keys (usually a [`CachedKeyProvider`](crate::jwks::CachedKeyProvider)).
    keys: Arc<dyn KeyProvider>,
    /// Token verifier.
    verifier: TokenVerifier,
}

impl IdentityAuthenticator {
    /// Creates a new authenticator.
    pub fn new(keys: Arc<dyn KeyProvider>, verifier: TokenVerifier) -> Self {
        Self { keys, verifier }
    }

    /// Verifies `token` at the current time.
    pub async fn authenticate(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        self.authenticate_at(token, Utc::now().timestamp()).await
    }

    /// Verifies `token` as of `now` (epoch seconds).
    pub async fn authenticate_at(
        &self,
        token: &str,
        now: i64,
    ) -> Result<VerifiedIdentity, AuthError> {
        let keys = self.keys.fetch().await?;

        let claims = match self.verifier.verify(token, &keys, now) {
            Err(AuthError::KeyNotFound { kid, .. }) => {
                debug!(kid = %kid, "Unknown key id, refreshing signing keys");
                let keys = self.keys.refresh().await?;
                self.verifier.verify(token, &keys, now)?
            }
            other => other?,
        };

        Ok(claims.identity())
    }
}
