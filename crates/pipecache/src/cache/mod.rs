//! Cache module for the request pipeline.
//!
//! This module provides the keyed envelope store, per-request registrars
//! and removers, the two pipeline behaviors and the registration table
//! that installs them into a mediator.

pub mod behavior;
pub mod envelope;
pub mod invalidation;
pub mod keys;
pub mod policy;
pub mod registrar;
pub mod registry;
pub mod remover;

// Re-exports
pub use behavior::{CacheBehavior, LookupPolicy};
pub use envelope::{CacheEnvelope, CacheValue, KeyedStore};
pub use invalidation::CacheInvalidationBehavior;
pub use keys::CacheKey;
pub use policy::ExpirationPolicy;
pub use registrar::{CacheRegistrar, RegistrarConfig, RegistrarConfigBuilder};
pub use registry::CacheRegistry;
pub use remover::{CacheRemover, Invalidator};
