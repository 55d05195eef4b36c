//! # Pipecache Store
//!
//! String key-value stores with per-entry expiration, used as the backing
//! storage of the pipecache request cache.
//!
//! ## Features
//!
//! - Async trait-based store abstraction
//! - Absolute, relative-to-now and sliding expiration
//! - In-process backend with an injectable clock
//! - Redis backend over a multiplexed connection
//!
//! ## Example
//!
//! ```ignore
//! use pipecache_store::{EntryOptions, KeyValueStore, MemoryStore};
//! use std::time::Duration;
//!
//! let store = MemoryStore::new();
//! let options = EntryOptions::new().with_sliding_expiration(Duration::from_secs(3600));
//!
//! store.set_string("orders:42", "{\"value\":1}", &options).await?;
//! let value = store.get_string("orders:42").await?;
//! ```

pub mod backend;
pub mod clock;
pub mod error;
pub mod store;

// Re-exports
pub use backend::{MemoryStore, RedisStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::StoreError;
pub use store::{EntryOptions, KeyValueStore};
