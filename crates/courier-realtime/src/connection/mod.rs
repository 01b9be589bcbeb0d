//! Connection authentication and lifecycle.

pub mod authenticator;
pub mod lifecycle;

pub use authenticator::{ConnectionAuthenticator, Credential, CredentialError};
pub use lifecycle::{ConnectionLifecycle, InboundTask, OpenConnection};
