//! Resolves the credential a connection presents into a verified identity.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use courier_auth::{AuthError, IdentityAuthenticator, SessionLookup, SessionStore};
use courier_core::error::{AppError, ErrorKind};
use courier_core::types::VerifiedIdentity;

/// Credential presented when a connection opens.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// A signed identity token, verified against the issuer's keys.
    IdentityToken(String),
    /// A session token issued at login, resolved once.
    SessionToken(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdentityToken(_) => f.write_str("IdentityToken(..)"),
            Self::SessionToken(_) => f.write_str("SessionToken(..)"),
        }
    }
}

/// Why a credential was not accepted.
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    /// Identity token verification failed.
    #[error(transparent)]
    Token(#[from] AuthError),

    /// No session has this token.
    #[error("session not found")]
    SessionNotFound,

    /// The session has expired.
    #[error("session expired")]
    SessionExpired,

    /// The session backend failed.
    #[error("session lookup failed: {0}")]
    Lookup(String),
}

impl CredentialError {
    /// Short stable name of the failure, for structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Token(e) => e.label(),
            Self::SessionNotFound => "session_not_found",
            Self::SessionExpired => "session_expired",
            Self::Lookup(_) => "session_lookup_failed",
        }
    }

    /// Whether the failure is a rejection of the caller rather than a
    /// backend fault.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Lookup(_))
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        let kind = if err.is_rejection() {
            ErrorKind::Authentication
        } else {
            ErrorKind::ExternalService
        };
        AppError::new(kind, err.to_string())
    }
}

/// Authenticates connections by identity token or session token.
#[derive(Debug, Clone)]
pub struct ConnectionAuthenticator {
    identity: IdentityAuthenticator,
    sessions: Arc<SessionStore>,
}

impl ConnectionAuthenticator {
    /// Creates a new authenticator.
    pub fn new(identity: IdentityAuthenticator, sessions: Arc<SessionStore>) -> Self {
        Self { identity, sessions }
    }

    /// The session store used for session tokens.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Verifies an identity token.
    pub async fn verify_identity_token(
        &self,
        token: &str,
    ) -> Result<VerifiedIdentity, CredentialError> {
        Ok(self.identity.authenticate(token).await?)
    }

    /// Resolves `credential`. Runs before any relay work for the
    /// connection.
    pub async fn authenticate(
        &self,
        credential: &Credential,
    ) -> Result<VerifiedIdentity, CredentialError> {
        match credential {
            Credential::IdentityToken(token) => self.verify_identity_token(token).await,
            Credential::SessionToken(token) => {
                let lookup = self
                    .sessions
                    .resolve(token)
                    .await
                    .map_err(|e| CredentialError::Lookup(e.to_string()))?;
                match lookup {
                    SessionLookup::Active(identity) => {
                        debug!(user_hash = %identity.user_hash(), "Session resolved");
                        Ok(identity)
                    }
                    SessionLookup::NotFound => Err(CredentialError::SessionNotFound),
                    SessionLookup::Expired => Err(CredentialError::SessionExpired),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use courier_auth::testing::{claims_for, mint_token, test_signing_key};
    use courier_auth::{KeyProvider, MemorySessionRepository, TokenVerifier};
    use courier_auth::jwks::KeySet;
    use courier_core::config::SessionConfig;

    use super::*;

    #[derive(Debug)]
    struct StaticKeys;

    #[async_trait]
    impl KeyProvider for StaticKeys {
        fn source(&self) -> &str {
            "static"
        }

        async fn fetch(&self) -> Result<KeySet, AuthError> {
            Ok(Arc::new(vec![test_signing_key("k1")]))
        }
    }

    fn authenticator() -> ConnectionAuthenticator {
        let identity = IdentityAuthenticator::new(
            Arc::new(StaticKeys),
            TokenVerifier::new("app1", vec!["https://accounts.google.com".to_string()]),
        );
        let sessions = Arc::new(SessionStore::new(
            Arc::new(MemorySessionRepository::new()),
            &SessionConfig::default(),
        ));
        ConnectionAuthenticator::new(identity, sessions)
    }

    #[tokio::test]
    async fn test_identity_token_credential() {
        let auth = authenticator();
        let token = mint_token("k1", &claims_for("u7", "u7@x.com"));

        let identity = auth
            .authenticate(&Credential::IdentityToken(token))
            .await
            .unwrap();
        assert_eq!(identity, VerifiedIdentity::new("u7", "u7@x.com"));
    }

    #[tokio::test]
    async fn test_bad_identity_token_keeps_variant() {
        let err = authenticator()
            .authenticate(&Credential::IdentityToken("not-a-token".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.label(), "malformed_token");
        assert_eq!(AppError::from(err).kind, ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn test_session_token_credential() {
        let auth = authenticator();
        let issued = auth
            .sessions()
            .issue(&VerifiedIdentity::new("u1", "u1@x.com"))
            .await
            .unwrap();

        let identity = auth
            .authenticate(&Credential::SessionToken(issued.token))
            .await
            .unwrap();
        assert_eq!(identity.subject, "u1");
    }

    #[tokio::test]
    async fn test_unknown_session_is_rejected() {
        let err = authenticator()
            .authenticate(&Credential::SessionToken("missing".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::SessionNotFound));
        assert!(err.is_rejection());
    }

    #[test]
    fn test_debug_hides_token() {
        let shown = format!("{:?}", Credential::SessionToken("secret".to_string()));
        assert!(!shown.contains("secret"));
    }
}
