//! # courier-storage
//!
//! Artifact storage for Courier. Uploads are written here before their
//! notification is published, and the relay reads them back for backlog
//! replay.

pub mod local;

pub use local::LocalArtifactStore;
