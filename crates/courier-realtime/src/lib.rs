//! # courier-realtime
//!
//! The per-connection side of Courier:
//!
//! - `subscription`: get-or-create of a user's topic and one unique,
//!   exclusively owned subscription per connection, released exactly once
//! - `relay`: framing, the single writer task per connection, the bus
//!   receive loop, and optional backlog replay
//! - `connection`: credential resolution and the cancellation-driven
//!   lifecycle that tears every per-connection resource down together
//! - `ingest`: store an upload and publish its notification
//! - `server`: the engine tying these together with a process-wide
//!   shutdown token

pub mod connection;
pub mod error;
pub mod ingest;
pub mod message;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod stamp;
pub mod subscription;

pub use connection::{
    ConnectionAuthenticator, ConnectionLifecycle, Credential, CredentialError, InboundTask,
    OpenConnection,
};
pub use error::RelayError;
pub use ingest::{IngestReceipt, IngestService};
pub use metrics::{MetricsSnapshot, RelayMetrics};
pub use relay::{ConnectionWriter, EventStream, EventStreamTransport, FrameTransport, Outbound};
pub use server::RealtimeEngine;
pub use subscription::{SubscriptionLease, SubscriptionManager};
