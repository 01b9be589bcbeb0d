//! Published signing keys: parsing, HTTP retrieval, and caching.

pub mod cache;
pub mod key;
pub mod provider;

pub use cache::{CachedKeyProvider, DEFAULT_MIN_REFRESH_INTERVAL};
pub use key::{KeySet, SigningKey, parse_key_set};
pub use provider::{HttpKeyProvider, KeyProvider};
