//! Signing keys decoded from a JSON Web Key Set document.

use std::sync::Arc;

use base64::Engine;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tracing::debug;

use crate::error::AuthError;
use crate::jwt::BASE64URL;

/// An immutable, shareable set of signing keys.
pub type KeySet = Arc<Vec<SigningKey>>;

/// One RSA public signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    /// `kid`
    pub key_id: String,
    /// `kty`
    pub key_type: String,
    /// `alg`
    pub algorithm: String,
    /// `use`
    pub key_use: String,
    /// Big-endian modulus.
    pub modulus: Vec<u8>,
    /// Big-endian public exponent.
    pub exponent: Vec<u8>,
}

impl SigningKey {
    /// Whether this key is the signing key for `kid` under `alg`.
    pub fn matches(&self, kid: &str, alg: &str) -> bool {
        self.key_id == kid && self.algorithm == alg && self.key_use == "sig"
    }

    /// Builds the verification key from the raw modulus and exponent.
    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_rsa_raw_components(&self.modulus, &self.exponent)
    }
}

#[derive(Debug, Deserialize)]
struct JwkDocument {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    #[serde(default)]
    kid: String,
    #[serde(default)]
    alg: String,
    #[serde(default, rename = "use")]
    key_use: String,
    #[serde(default)]
    n: String,
    #[serde(default)]
    e: String,
}

/// Parses a `{"keys": [...]}` document into RSA signing keys.
///
/// Non-RSA entries and entries with undecodable components are skipped.
/// A document without any usable key is an error, never an empty set.
pub fn parse_key_set(body: &[u8]) -> Result<Vec<SigningKey>, AuthError> {
    let document: JwkDocument = serde_json::from_slice(body)
        .map_err(|e| AuthError::KeyFetchFailed(format!("invalid key set document: {e}")))?;

    let mut keys = Vec::with_capacity(document.keys.len());
    for jwk in document.keys {
        if jwk.kty != "RSA" {
            debug!(kid = %jwk.kid, kty = %jwk.kty, "Skipping non-RSA key");
            continue;
        }
        let (Ok(modulus), Ok(exponent)) = (BASE64URL.decode(&jwk.n), BASE64URL.decode(&jwk.e))
        else {
            debug!(kid = %jwk.kid, "Skipping key with undecodable components");
            continue;
        };
        if modulus.is_empty() || exponent.is_empty() {
            continue;
        }
        keys.push(SigningKey {
            key_id: jwk.kid,
            key_type: jwk.kty,
            algorithm: jwk.alg,
            key_use: jwk.key_use,
            modulus,
            exponent,
        });
    }

    if keys.is_empty() {
        return Err(AuthError::KeyFetchFailed(
            "key set contains no usable RSA keys".to_string(),
        ));
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{TEST_JWK_E, TEST_JWK_N};

    #[test]
    fn test_parse_rsa_keys_and_skip_others() {
        let doc = json!({
            "keys": [
                {"kty": "RSA", "kid": "k1", "alg": "RS256", "use": "sig", "n": TEST_JWK_N, "e": TEST_JWK_E},
                {"kty": "EC", "kid": "ec1", "alg": "ES256", "use": "sig", "crv": "P-256", "x": "AA", "y": "AA"}
            ]
        });
        let keys = parse_key_set(doc.to_string().as_bytes()).unwrap();

        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key_id, "k1");
        assert_eq!(keys[0].exponent, vec![0x01, 0x00, 0x01]);
        assert_eq!(keys[0].modulus.len(), 256);
        assert!(keys[0].matches("k1", "RS256"));
        assert!(!keys[0].matches("k1", "RS512"));
    }

    #[test]
    fn test_empty_key_set_is_an_error() {
        let err = parse_key_set(br#"{"keys": []}"#).unwrap_err();
        assert!(matches!(err, AuthError::KeyFetchFailed(_)));
    }

    #[test]
    fn test_invalid_document_is_an_error() {
        let err = parse_key_set(b"<html>").unwrap_err();
        assert!(matches!(err, AuthError::KeyFetchFailed(_)));
    }
}
