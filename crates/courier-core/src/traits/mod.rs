//! Collaborator traits consumed by the relay core.
//!
//! Concrete implementations live in the bus, storage, database, and auth
//! crates; the relay only ever sees these seams.

pub mod bus;
pub mod session;
pub mod storage;
