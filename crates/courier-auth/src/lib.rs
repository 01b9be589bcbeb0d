//! # courier-auth
//!
//! Authentication for the Courier relay.
//!
//! ## Modules
//!
//! - `jwt`: verification of RS256 identity tokens against a signing-key set
//! - `jwks`: retrieval and issuer-keyed caching of published signing keys
//! - `session`: login sessions (issue, resolve, expire) and the expiry sweep
//! - `authenticator`: ties key retrieval and verification together

pub mod authenticator;
pub mod error;
pub mod jwks;
pub mod jwt;
pub mod session;

pub use authenticator::IdentityAuthenticator;
pub use error::AuthError;
pub use jwks::{CachedKeyProvider, HttpKeyProvider, KeyProvider, SigningKey};
pub use jwt::{IdentityClaims, TokenVerifier};
pub use session::{MemorySessionRepository, SessionLookup, SessionStore, SessionSweeper};

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
