//! Authentication failure taxonomy.

use courier_core::error::{AppError, ErrorKind};

/// Every way an identity token can be rejected.
///
/// Variants are distinguishable for logging and tests. At the HTTP boundary
/// all of them collapse into one generic authorization rejection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The token is not three non-empty base64url sections of valid JSON.
    #[error("malformed token: {0}")]
    MalformedToken(String),
    /// No signing key matches the token's key id and algorithm.
    #[error("no signing key for kid '{kid}' and alg '{alg}'")]
    KeyNotFound { kid: String, alg: String },
    /// The token is signed with an algorithm other than RS256.
    #[error("unsupported algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    /// The signature does not verify against the selected key.
    #[error("signature verification failed")]
    BadSignature,
    /// The `aud` claim is not the expected audience.
    #[error("audience mismatch: '{0}'")]
    AudienceMismatch(String),
    /// The `iss` claim is not an accepted issuer.
    #[error("issuer mismatch: '{0}'")]
    IssuerMismatch(String),
    /// The token was issued in the future.
    #[error("token not yet valid (iat {issued_at}, now {now})")]
    NotYetValid { issued_at: i64, now: i64 },
    /// The token has expired.
    #[error("token expired (exp {expiry}, now {now})")]
    Expired { expiry: i64, now: i64 },
    /// The signing-key set could not be retrieved.
    #[error("key fetch failed: {0}")]
    KeyFetchFailed(String),
}

impl AuthError {
    /// Short machine-readable label for structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MalformedToken(_) => "malformed_token",
            Self::KeyNotFound { .. } => "key_not_found",
            Self::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            Self::BadSignature => "bad_signature",
            Self::AudienceMismatch(_) => "audience_mismatch",
            Self::IssuerMismatch(_) => "issuer_mismatch",
            Self::NotYetValid { .. } => "not_yet_valid",
            Self::Expired { .. } => "expired",
            Self::KeyFetchFailed(_) => "key_fetch_failed",
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::with_source(ErrorKind::Authentication, err.to_string(), err)
    }
}
