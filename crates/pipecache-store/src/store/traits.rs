//! Key-value store trait definition.

use async_trait::async_trait;

use super::EntryOptions;
use crate::error::StoreError;

/// An asynchronous string key-value store with per-entry expiration.
///
/// Values are opaque strings; callers own serialization. Implementations
/// must be safe for unsynchronized concurrent use from many tasks.
///
/// # Implementors
///
/// - `MemoryStore` - In-process store, for tests and single-node deployments
/// - `RedisStore` - Redis-backed store, shared by every node
///
/// # Example
///
/// ```ignore
/// use pipecache_store::{EntryOptions, KeyValueStore, StoreError};
///
/// struct MyStore;
///
/// #[async_trait]
/// impl KeyValueStore for MyStore {
///     async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
///         // Implementation here
///     }
///
///     async fn set_string(
///         &self,
///         key: &str,
///         value: &str,
///         options: &EntryOptions,
///     ) -> Result<(), StoreError> {
///         // Implementation here
///     }
///
///     async fn remove(&self, key: &str) -> Result<(), StoreError> {
///         // Implementation here
///     }
///
///     fn name(&self) -> &str {
///         "my-store"
///     }
/// }
/// ```
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key is absent or expired. Reading an entry
    /// with sliding expiration extends its lifetime.
    ///
    /// # Errors
    ///
    /// - `StoreError::Unavailable` or `StoreError::Redis` if the store cannot be reached
    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidOptions` if `options` are rejected
    /// - `StoreError::Unavailable` or `StoreError::Redis` if the store cannot be reached
    async fn set_string(
        &self,
        key: &str,
        value: &str,
        options: &EntryOptions,
    ) -> Result<(), StoreError>;

    /// Deletes `key`. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// - `StoreError::Unavailable` or `StoreError::Redis` if the store cannot be reached
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Returns the name of this store.
    ///
    /// This is used for logging and identification purposes.
    fn name(&self) -> &str;
}
