//! # courier-bus
//!
//! Implementations of the [`MessageBus`](courier_core::traits::bus::MessageBus)
//! collaborator.
//!
//! - `memory`: in-process topics with per-subscription queues (single node)
//! - `redis`: Redis Streams with one consumer group per subscription
//!   (feature `redis-bus`)

pub mod memory;
pub mod provider;
#[cfg(feature = "redis-bus")]
pub mod redis;

pub use memory::MemoryBus;
pub use provider::build_bus;
