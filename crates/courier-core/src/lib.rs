//! # courier-core
//!
//! Core crate for Courier. Contains the collaborator traits (message bus,
//! artifact store, session persistence), configuration schemas, identity
//! types, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Courier crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
