//! Multi-key JSON envelopes over a string key-value store.
//!
//! A value is written once per key, always wrapped together with the full key
//! list. Removing through any one key reads that list back and deletes every
//! sibling, so an entry reachable by N keys disappears as a unit.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use pipecache_core::CancellationToken;
use pipecache_store::{EntryOptions, KeyValueStore, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace, warn};

use crate::cache::keys::{CacheKey, dedup_keys};
use crate::error::{CacheError, KeyFailure};

/// A response type that can be cached.
pub trait CacheValue: Serialize + DeserializeOwned + Debug + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Serialize + DeserializeOwned + Debug + Send + Sync + 'static {}

/// The persisted unit: a value plus every key it is stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope<T> {
    pub value: T,
    pub keys: Vec<String>,
}

/// Envelope view that skips the value, for cascade deletes.
#[derive(Deserialize)]
struct EnvelopeKeys {
    keys: Vec<String>,
}

/// Keyed store adapter with envelope semantics and concurrent fan-out.
#[derive(Clone)]
pub struct KeyedStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for KeyedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedStore")
            .field("store", &self.store.name())
            .finish()
    }
}

impl KeyedStore {
    /// Wraps a store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Writes `value` under every key in `keys`.
    ///
    /// All writes are issued concurrently with the same options. Succeeds
    /// only if every write succeeds; written keys are not rolled back.
    ///
    /// # Errors
    ///
    /// - `CacheError::FanOut` listing each key that failed
    /// - `CacheError::Cancelled` if `cancel` fires first
    #[instrument(skip_all, fields(cache.operation = "set", cache.keys = keys.len()))]
    pub async fn set<T>(
        &self,
        value: &T,
        keys: &[CacheKey],
        options: &EntryOptions,
        cancel: &CancellationToken,
    ) -> Result<(), CacheError>
    where
        T: Serialize + Sync,
    {
        let keys = dedup_keys(keys.iter().cloned());
        if keys.is_empty() {
            return Ok(());
        }

        let envelope = CacheEnvelope {
            value,
            keys: keys.iter().map(ToString::to_string).collect(),
        };
        let payload = serde_json::to_string(&envelope)?;
        let payload = payload.as_str();

        let writes = keys.iter().map(|key| async move {
            self.store
                .set_string(key.as_str(), payload, options)
                .await
                .map_err(|source| failure(key, source))
        });

        let results = cancellable(cancel, join_all(writes)).await?;
        trace!(count = keys.len(), "envelope written");

        collect_failures("set", results)
    }

    /// Reads the value stored at `key`.
    ///
    /// Absent, empty and whitespace-only content is a miss. So is content
    /// that does not decode as an envelope of `T`; that case is logged.
    ///
    /// # Errors
    ///
    /// - `CacheError::Store` if the read fails
    /// - `CacheError::Cancelled` if `cancel` fires first
    #[instrument(skip_all, fields(cache.operation = "get", cache.key = %key))]
    pub async fn get<T>(
        &self,
        key: &CacheKey,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        let Some(raw) = self.read(key, cancel).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<CacheEnvelope<T>>(&raw) {
            Ok(envelope) => Ok(Some(envelope.value)),
            Err(err) => {
                warn!(cache.key = %key, error = %err, "Ignoring undecodable cache entry");
                Ok(None)
            },
        }
    }

    /// Removes the entry at `key` together with all of its sibling keys.
    ///
    /// Missing keys are a no-op. If the stored content cannot be decoded
    /// only `key` itself is deleted.
    ///
    /// # Errors
    ///
    /// - `CacheError::Store` if the initial read fails
    /// - `CacheError::FanOut` listing each delete that failed
    /// - `CacheError::Cancelled` if `cancel` fires first
    #[instrument(skip_all, fields(cache.operation = "remove", cache.key = %key))]
    pub async fn remove(&self, key: &CacheKey, cancel: &CancellationToken) -> Result<(), CacheError> {
        let Some(raw) = self.read(key, cancel).await? else {
            trace!("nothing to remove");
            return Ok(());
        };

        let mut keys: Vec<String> = match serde_json::from_str::<EnvelopeKeys>(&raw) {
            Ok(envelope) => envelope.keys,
            Err(err) => {
                warn!(cache.key = %key, error = %err, "Removing undecodable cache entry");
                Vec::new()
            },
        };
        if !keys.iter().any(|k| k == key.as_str()) {
            keys.push(key.to_string());
        }

        let deletes = keys.iter().map(|sibling| async move {
            self.store
                .remove(sibling)
                .await
                .map_err(|source| KeyFailure {
                    key: sibling.clone(),
                    source,
                })
        });

        let results = cancellable(cancel, join_all(deletes)).await?;
        trace!(count = keys.len(), "envelope removed");

        collect_failures("remove", results)
    }

    async fn read(
        &self,
        key: &CacheKey,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, CacheError> {
        let raw = cancellable(cancel, self.store.get_string(key.as_str())).await??;
        Ok(raw.filter(|content| !content.trim().is_empty()))
    }
}

fn failure(key: &CacheKey, source: StoreError) -> KeyFailure {
    KeyFailure {
        key: key.to_string(),
        source,
    }
}

fn collect_failures(
    operation: &'static str,
    results: Vec<Result<(), KeyFailure>>,
) -> Result<(), CacheError> {
    let total = results.len();
    let failures: Vec<KeyFailure> = results.into_iter().filter_map(Result::err).collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(CacheError::FanOut {
            operation,
            total,
            failures,
        })
    }
}

/// Runs `future` unless `cancel` fires first.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, CacheError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CacheError::Cancelled),
        output = future => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pipecache_store::MemoryStore;
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u32,
        name: String,
    }

    fn order() -> Order {
        Order {
            id: 1,
            name: "first".to_string(),
        }
    }

    fn setup() -> (KeyedStore, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::new());
        (KeyedStore::new(memory.clone()), memory)
    }

    #[tokio::test]
    async fn test_set_writes_identical_envelope_under_every_key() {
        let (store, memory) = setup();
        let cancel = CancellationToken::new();
        let keys = [CacheKey::new("q", "1"), CacheKey::new("q", "first")];

        store
            .set(&order(), &keys, &EntryOptions::new(), &cancel)
            .await
            .unwrap();

        let a = memory.get_string("q:1").await.unwrap().unwrap();
        let b = memory.get_string("q:first").await.unwrap().unwrap();
        assert_eq!(a, b);

        let envelope: CacheEnvelope<Order> = serde_json::from_str(&a).unwrap();
        assert_eq!(envelope.value, order());
        assert_eq!(envelope.keys, vec!["q:1", "q:first"]);
    }

    #[test]
    fn test_envelope_json_shape() {
        let envelope = CacheEnvelope {
            value: 5,
            keys: vec!["q:5".to_string()],
        };

        assert_eq!(
            serde_json::to_string(&envelope).unwrap(),
            r#"{"value":5,"keys":["q:5"]}"#
        );
    }

    #[tokio::test]
    async fn test_get_returns_value_only() {
        let (store, _) = setup();
        let cancel = CancellationToken::new();
        let key = CacheKey::new("q", "1");

        store
            .set(&order(), std::slice::from_ref(&key), &EntryOptions::new(), &cancel)
            .await
            .unwrap();

        let value: Option<Order> = store.get(&key, &cancel).await.unwrap();
        assert_eq!(value, Some(order()));
    }

    #[tokio::test]
    async fn test_get_treats_blank_and_missing_as_absent() {
        let (store, memory) = setup();
        let cancel = CancellationToken::new();

        memory
            .set_string("q:blank", "   ", &EntryOptions::new())
            .await
            .unwrap();

        let blank: Option<Order> = store.get(&CacheKey::new("q", "blank"), &cancel).await.unwrap();
        let missing: Option<Order> = store.get(&CacheKey::new("q", "none"), &cancel).await.unwrap();

        assert!(blank.is_none());
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_get_undecodable_is_miss() {
        let (store, memory) = setup();
        let cancel = CancellationToken::new();

        memory
            .set_string("q:bad", "{not json", &EntryOptions::new())
            .await
            .unwrap();

        let value: Option<Order> = store.get(&CacheKey::new("q", "bad"), &cancel).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_remove_cascades_to_siblings() {
        let (store, memory) = setup();
        let cancel = CancellationToken::new();
        let keys = [CacheKey::new("q", "1"), CacheKey::new("q", "first")];

        store
            .set(&order(), &keys, &EntryOptions::new(), &cancel)
            .await
            .unwrap();
        store.remove(&keys[1], &cancel).await.unwrap();

        assert!(memory.get_string("q:1").await.unwrap().is_none());
        assert!(memory.get_string("q:first").await.unwrap().is_none());
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_is_noop() {
        let (store, _) = setup();
        store
            .remove(&CacheKey::new("q", "none"), &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_undecodable_deletes_only_that_key() {
        let (store, memory) = setup();
        let cancel = CancellationToken::new();

        memory.set_string("q:bad", "oops", &EntryOptions::new()).await.unwrap();
        memory.set_string("q:other", "kept", &EntryOptions::new()).await.unwrap();

        store.remove(&CacheKey::new("q", "bad"), &cancel).await.unwrap();

        assert!(!memory.contains_key("q:bad"));
        assert!(memory.contains_key("q:other"));
    }

    #[tokio::test]
    async fn test_duplicate_keys_written_once() {
        let (store, _) = setup();
        let cancel = CancellationToken::new();
        let keys = [CacheKey::new("q", "1"), CacheKey::new("q", "1")];

        store
            .set(&order(), &keys, &EntryOptions::new(), &cancel)
            .await
            .unwrap();

        let raw = store.store().get_string("q:1").await.unwrap().unwrap();
        let envelope: CacheEnvelope<Order> = serde_json::from_str(&raw).unwrap();
        assert_eq!(envelope.keys, vec!["q:1"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_set() {
        let (store, memory) = setup();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = store
            .set(&order(), &[CacheKey::new("q", "1")], &EntryOptions::new(), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(memory.is_empty());
    }

    const DELAY: Duration = Duration::from_millis(100);

    /// Memory store whose writes and deletes each take `DELAY`.
    #[derive(Debug, Default)]
    struct SlowStore {
        inner: MemoryStore,
        failing_key: Option<&'static str>,
    }

    #[async_trait]
    impl KeyValueStore for SlowStore {
        async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get_string(key).await
        }

        async fn set_string(&self, key: &str, value: &str, options: &EntryOptions) -> Result<(), StoreError> {
            tokio::time::sleep(DELAY).await;
            if self.failing_key == Some(key) {
                return Err(StoreError::unavailable("write refused"));
            }
            self.inner.set_string(key, value, options).await
        }

        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            tokio::time::sleep(DELAY).await;
            self.inner.remove(key).await
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn four_keys() -> Vec<CacheKey> {
        (0..4).map(|i| CacheKey::new("q", &i.to_string())).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_writes_keys_concurrently() {
        let store = KeyedStore::new(Arc::new(SlowStore::default()));
        let cancel = CancellationToken::new();

        let start = Instant::now();
        store
            .set(&order(), &four_keys(), &EntryOptions::new(), &cancel)
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= DELAY);
        assert!(elapsed < DELAY * 2, "writes ran one after another: {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_deletes_siblings_concurrently() {
        let slow = Arc::new(SlowStore::default());
        let store = KeyedStore::new(slow.clone());
        let cancel = CancellationToken::new();
        let keys = four_keys();

        store
            .set(&order(), &keys, &EntryOptions::new(), &cancel)
            .await
            .unwrap();

        let start = Instant::now();
        store.remove(&keys[2], &cancel).await.unwrap();
        let elapsed = start.elapsed();

        assert!(slow.inner.is_empty());
        assert!(elapsed >= DELAY);
        assert!(elapsed < DELAY * 2, "deletes ran one after another: {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_does_not_stop_other_writes() {
        let slow = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            failing_key: Some("q:0"),
        });
        let store = KeyedStore::new(slow.clone());

        let start = Instant::now();
        let err = store
            .set(&order(), &four_keys(), &EntryOptions::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            CacheError::FanOut {
                operation,
                total,
                failures,
            } => {
                assert_eq!(operation, "set");
                assert_eq!(total, 4);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].key, "q:0");
            },
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(start.elapsed() < DELAY * 2);
        assert!(!slow.inner.contains_key("q:0"));
        for key in ["q:1", "q:2", "q:3"] {
            assert!(slow.inner.contains_key(key), "{} was not written", key);
        }
    }
}
