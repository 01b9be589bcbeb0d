//! Login sessions.
//!
//! A session binds an opaque token to a verified identity for a bounded
//! time. Push-stream connections present the token instead of re-sending
//! the identity token.

pub mod cleanup;
pub mod memory;
pub mod store;

pub use cleanup::SessionSweeper;
pub use memory::MemorySessionRepository;
pub use store::{IssuedSession, SessionLookup, SessionStore};
