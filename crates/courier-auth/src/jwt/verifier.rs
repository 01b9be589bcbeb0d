//! Pure verification of identity tokens against a signing-key set.

use base64::Engine;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode};

use courier_core::config::AuthConfig;

use super::BASE64URL;
use super::claims::IdentityClaims;
use super::header::TokenHeader;
use crate::error::AuthError;
use crate::jwks::SigningKey;

/// The only accepted signing algorithm.
const SUPPORTED_ALGORITHM: &str = "RS256";

/// Verifies compact RS256 identity tokens.
///
/// Holds no mutable state. The key set and the current time are supplied
/// by the caller on every call.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    /// Expected `aud` claim.
    audience: String,
    /// Accepted `iss` claim values.
    accepted_issuers: Vec<String>,
}

impl TokenVerifier {
    /// Creates a verifier for one audience and a set of accepted issuers.
    pub fn new(audience: impl Into<String>, accepted_issuers: Vec<String>) -> Self {
        Self {
            audience: audience.into(),
            accepted_issuers,
        }
    }

    /// Creates a verifier from auth configuration.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.audience.clone(), config.accepted_issuers.clone())
    }

    /// The audience this verifier expects.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Verifies `token` against `keys` at time `now` (epoch seconds).
    ///
    /// Checks, in order:
    /// 1. Three non-empty dot-separated sections
    /// 2. Decodable header
    /// 3. A key matching `{kid, alg, "sig"}`
    /// 4. RS256 signature over `header.payload`
    /// 5. Decodable claims
    /// 6. Audience, issuer, `iat <= now < exp`
    pub fn verify(
        &self,
        token: &str,
        keys: &[SigningKey],
        now: i64,
    ) -> Result<IdentityClaims, AuthError> {
        let sections: Vec<&str> = token.split('.').collect();
        let [header_section, payload_section, signature_section] = sections[..] else {
            return Err(AuthError::MalformedToken(format!(
                "expected 3 sections, found {}",
                sections.len()
            )));
        };
        if sections.iter().any(|s| s.is_empty()) {
            return Err(AuthError::MalformedToken("empty section".to_string()));
        }

        let header = TokenHeader::decode(header_section)?;

        let key = keys
            .iter()
            .find(|k| k.matches(&header.kid, &header.alg))
            .ok_or_else(|| AuthError::KeyNotFound {
                kid: header.kid.clone(),
                alg: header.alg.clone(),
            })?;

        if header.alg != SUPPORTED_ALGORITHM {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }
        BASE64URL
            .decode(signature_section)
            .map_err(|e| AuthError::MalformedToken(format!("signature encoding: {e}")))?;
        verify_signature(token, key)?;

        let claims = IdentityClaims::decode(payload_section)?;

        if claims.audience != self.audience {
            return Err(AuthError::AudienceMismatch(claims.audience));
        }
        if !self.accepted_issuers.iter().any(|i| *i == claims.issuer) {
            return Err(AuthError::IssuerMismatch(claims.issuer));
        }
        if now < claims.issued_at {
            return Err(AuthError::NotYetValid {
                issued_at: claims.issued_at,
                now,
            });
        }
        if now >= claims.expiry {
            return Err(AuthError::Expired {
                expiry: claims.expiry,
                now,
            });
        }

        Ok(claims)
    }
}

/// Checks the RS256 signature only; every claim check is disabled here and
/// done by [`TokenVerifier::verify`] so each failure keeps its own variant.
fn verify_signature(token: &str, key: &SigningKey) -> Result<(), AuthError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<serde_json::Value>(token, &key.decoding_key(), &validation)
        .map(|_| ())
        .map_err(|e| match e.kind() {
            JwtErrorKind::Base64(_) | JwtErrorKind::Json(_) | JwtErrorKind::Utf8(_) => {
                AuthError::MalformedToken(e.to_string())
            }
            _ => AuthError::BadSignature,
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{mint_token, scenario_claims, test_signing_key};

    const NOW: i64 = 1_700_000_000;

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(
            "app1",
            vec![
                "accounts.google.com".to_string(),
                "https://accounts.google.com".to_string(),
            ],
        )
    }

    fn keys() -> Vec<SigningKey> {
        vec![test_signing_key("k1")]
    }

    #[test]
    fn test_valid_token_returns_subject_and_email() {
        let token = mint_token("k1", &scenario_claims());
        let claims = verifier().verify(&token, &keys(), NOW).unwrap();

        assert_eq!(claims.subject, "u1");
        assert_eq!(claims.email, "u1@x.com");
        let identity = claims.identity();
        assert_eq!(
            (identity.subject.as_str(), identity.email.as_str()),
            ("u1", "u1@x.com")
        );
    }

    #[test]
    fn test_bare_issuer_form_is_accepted() {
        let mut claims = scenario_claims();
        claims["iss"] = json!("accounts.google.com");
        let token = mint_token("k1", &claims);
        assert!(verifier().verify(&token, &keys(), NOW).is_ok());
    }

    #[test]
    fn test_expired_token() {
        let mut claims = scenario_claims();
        claims["exp"] = json!(500);
        let token = mint_token("k1", &claims);

        let err = verifier().verify(&token, &keys(), NOW).unwrap_err();
        assert!(matches!(err, AuthError::Expired { expiry: 500, .. }));
    }

    #[test]
    fn test_expiry_equal_to_now_is_expired() {
        let mut claims = scenario_claims();
        claims["exp"] = json!(NOW);
        let token = mint_token("k1", &claims);

        let err = verifier().verify(&token, &keys(), NOW).unwrap_err();
        assert!(matches!(err, AuthError::Expired { .. }));
    }

    #[test]
    fn test_audience_mismatch() {
        let mut claims = scenario_claims();
        claims["aud"] = json!("other");
        let token = mint_token("k1", &claims);

        let err = verifier().verify(&token, &keys(), NOW).unwrap_err();
        assert_eq!(err, AuthError::AudienceMismatch("other".to_string()));
    }

    #[test]
    fn test_issuer_mismatch() {
        let mut claims = scenario_claims();
        claims["iss"] = json!("https://evil.example");
        let token = mint_token("k1", &claims);

        let err = verifier().verify(&token, &keys(), NOW).unwrap_err();
        assert!(matches!(err, AuthError::IssuerMismatch(_)));
    }

    #[test]
    fn test_issued_in_future_is_not_yet_valid() {
        let mut claims = scenario_claims();
        claims["iat"] = json!(NOW + 60);
        let token = mint_token("k1", &claims);

        let err = verifier().verify(&token, &keys(), NOW).unwrap_err();
        assert!(matches!(err, AuthError::NotYetValid { .. }));
    }

    #[test]
    fn test_wrong_section_count_is_malformed() {
        let v = verifier();
        for token in ["", "abc", "a.b", "a.b.c.d", "a..c", ".b.c", "a.b."] {
            let err = v.verify(token, &keys(), NOW).unwrap_err();
            assert!(
                matches!(err, AuthError::MalformedToken(_)),
                "{token:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_undecodable_header_is_malformed() {
        let err = verifier()
            .verify("!!!.eyJhIjoxfQ.c2ln", &keys(), NOW)
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken(_)));
    }

    #[test]
    fn test_unknown_kid() {
        let token = mint_token("k2", &scenario_claims());
        let err = verifier().verify(&token, &keys(), NOW).unwrap_err();
        assert!(matches!(err, AuthError::KeyNotFound { ref kid, .. } if kid == "k2"));
    }

    #[test]
    fn test_empty_key_set_is_key_not_found() {
        let token = mint_token("k1", &scenario_claims());
        let err = verifier().verify(&token, &[], NOW).unwrap_err();
        assert!(matches!(err, AuthError::KeyNotFound { .. }));
    }

    #[test]
    fn test_key_with_non_signature_use_is_ignored() {
        let mut key = test_signing_key("k1");
        key.key_use = "enc".to_string();
        let token = mint_token("k1", &scenario_claims());

        let err = verifier().verify(&token, &[key], NOW).unwrap_err();
        assert!(matches!(err, AuthError::KeyNotFound { .. }));
    }

    #[test]
    fn test_non_rs256_algorithm_is_unsupported() {
        let mut key = test_signing_key("k1");
        key.algorithm = "RS512".to_string();
        let header = BASE64URL.encode(br#"{"alg":"RS512","kid":"k1"}"#);
        let payload = BASE64URL.encode(scenario_claims().to_string());
        let token = format!("{header}.{payload}.c2lnbmF0dXJl");

        let err = verifier().verify(&token, &[key], NOW).unwrap_err();
        assert_eq!(err, AuthError::UnsupportedAlgorithm("RS512".to_string()));
    }

    #[test]
    fn test_tampered_payload_is_bad_signature() {
        let token = mint_token("k1", &scenario_claims());
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let mut forged = scenario_claims();
        forged["sub"] = json!("attacker");
        parts[1] = BASE64URL.encode(forged.to_string());
        let forged_token = parts.join(".");

        let err = verifier().verify(&forged_token, &keys(), NOW).unwrap_err();
        assert_eq!(err, AuthError::BadSignature);
    }

    #[test]
    fn test_signature_checked_before_claims() {
        // A forged token with a wrong audience must fail on the signature.
        let token = mint_token("k1", &scenario_claims());
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let mut forged = scenario_claims();
        forged["aud"] = json!("other");
        parts[1] = BASE64URL.encode(forged.to_string());

        let err = verifier().verify(&parts.join("."), &keys(), NOW).unwrap_err();
        assert_eq!(err, AuthError::BadSignature);
    }
}
