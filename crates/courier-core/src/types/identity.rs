//! Verified identities and their stable hashed form.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The identity extracted from a verified token or a resolved session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    /// Stable subject identifier.
    pub subject: String,
    /// Email address asserted by the issuer.
    pub email: String,
}

impl VerifiedIdentity {
    /// Create a new identity.
    pub fn new(subject: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: email.into(),
        }
    }

    /// The hashed form of the subject used in bus and storage names.
    pub fn user_hash(&self) -> UserHash {
        UserHash::from_subject(&self.subject)
    }
}

/// Lowercase hex SHA-256 of a subject identifier.
///
/// Used wherever a per-user name leaves the process, so the raw subject
/// never appears in bus or storage metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserHash(String);

impl UserHash {
    /// Hash a subject identifier.
    pub fn from_subject(subject: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(subject.as_bytes())))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_hex_sha256() {
        let hash = UserHash::from_subject("u1");
        assert_eq!(hash.as_str().len(), 64);
        assert!(hash.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, UserHash::from_subject("u1"));
        assert_ne!(hash, UserHash::from_subject("u2"));
    }

    #[test]
    fn test_known_digest() {
        // sha256("abc")
        assert_eq!(
            UserHash::from_subject("abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_identity_hash_uses_subject() {
        let id = VerifiedIdentity::new("u1", "u1@x.com");
        assert_eq!(id.user_hash(), UserHash::from_subject("u1"));
        assert!(!id.user_hash().to_string().contains("u1@"));
    }
}
