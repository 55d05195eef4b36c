//! # Pipecache
//!
//! Caching for a mediator request pipeline.
//!
//! Request types opt into caching by registering a [`cache::CacheRegistrar`]
//! that derives their cache keys. A cached request is served from the store
//! on a hit and populated after a miss. Other request types can be declared
//! as invalidators: once they complete, the cached entries they name are
//! removed together with every sibling key of the same entry.
//!
//! ## Example
//!
//! ```ignore
//! use pipecache::cache::{CacheRegistry, ExpirationPolicy, KeyedStore, RegistrarConfig};
//! use pipecache_core::{CancellationToken, Mediator};
//! use pipecache_store::MemoryStore;
//!
//! let mut registry = CacheRegistry::new(KeyedStore::new(Arc::new(MemoryStore::new())));
//! registry.register::<GetOrder>(
//!     RegistrarConfig::builder()
//!         .retrieving(|r: &GetOrder| r.id.to_string())
//!         .storing(|r: &GetOrder, order: &Order| vec![r.id.to_string(), order.number.clone()])
//!         .expiration(ExpirationPolicy::Sliding(Duration::from_secs(3600)))
//!         .build()?,
//! )?;
//! registry.invalidate_with::<CancelOrder, GetOrder>(|c| c.id.to_string())?;
//!
//! let mediator = registry
//!     .install(Mediator::builder().handler(GetOrderHandler).handler(CancelOrderHandler))
//!     .build();
//!
//! let order = mediator.send(GetOrder { id: 1 }, &CancellationToken::new()).await?;
//! ```

pub mod cache;
pub mod error;
pub mod metrics;
pub mod settings;

// Re-exports
pub use cache::{
    CacheBehavior, CacheInvalidationBehavior, CacheKey, CacheRegistrar, CacheRegistry,
    CacheRemover, ExpirationPolicy, Invalidator, KeyedStore, LookupPolicy, RegistrarConfig,
};
pub use error::{CacheError, KeyFailure};
pub use settings::{CacheSettings, SettingsError, StoreProvider};

// Re-export the dispatcher and stores for consumers
pub use pipecache_core;
pub use pipecache_store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
