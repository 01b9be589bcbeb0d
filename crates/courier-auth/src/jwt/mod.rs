//! RS256 identity token verification.
//!
//! A token is three base64url sections (`header.payload.signature`). The
//! verifier selects a signing key by `kid`/`alg`, checks the PKCS#1 v1.5
//! signature over `header.payload`, and only then trusts the claims.

pub mod claims;
pub mod header;
pub mod verifier;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

pub use claims::IdentityClaims;
pub use header::TokenHeader;
pub use verifier::TokenVerifier;

/// base64url, unpadded on encode, padding optional on decode.
pub(crate) const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);
