//! Per-connection subscription provisioning.

pub mod lease;
pub mod manager;

pub use lease::SubscriptionLease;
pub use manager::SubscriptionManager;
