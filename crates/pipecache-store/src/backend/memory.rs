//! In-process key-value store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock, elapsed_between};
use crate::error::StoreError;
use crate::store::{EntryOptions, KeyValueStore};

/// A stored value together with its expiration state.
#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    absolute: Option<DateTime<Utc>>,
    sliding: Option<Duration>,
    last_access: DateTime<Utc>,
}

impl MemoryEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if let Some(deadline) = self.absolute
            && now >= deadline
        {
            return true;
        }

        match self.sliding {
            Some(window) => elapsed_between(self.last_access, now) >= window,
            None => false,
        }
    }
}

/// In-process store backed by a hash map.
///
/// Expired entries are dropped lazily when they are read, or eagerly through
/// [`MemoryStore::purge_expired`]. Expiration is evaluated against the
/// injected [`Clock`].
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Creates an empty store using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store driven by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Returns the number of entries, including ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns true if `key` is present and not expired.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .read()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
        debug!("Memory store cleared");
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - entries.len();

        if purged > 0 {
            debug!("Purged {} expired entries from memory store", purged);
        }

        purged
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        let Some(entry) = entries.get_mut(key) else {
            trace!(key, "memory store miss");
            return Ok(None);
        };

        if entry.is_expired(now) {
            entries.remove(key);
            trace!(key, "memory store entry expired");
            return Ok(None);
        }

        if entry.sliding.is_some() {
            entry.last_access = now;
        }

        Ok(Some(entry.value.clone()))
    }

    async fn set_string(
        &self,
        key: &str,
        value: &str,
        options: &EntryOptions,
    ) -> Result<(), StoreError> {
        options.validate()?;

        let now = self.clock.now();
        let absolute = options.absolute_deadline(now);

        if let Some(deadline) = absolute
            && deadline <= now
        {
            // Already expired: the write only clears a previous value.
            self.entries.write().remove(key);
            trace!(key, "memory store write skipped, deadline already passed");
            return Ok(());
        }

        let entry = MemoryEntry {
            value: value.to_string(),
            absolute,
            sliding: options.sliding_expiration(),
            last_access: now,
        };

        self.entries.write().insert(key.to_string(), entry);
        trace!(key, "memory store write");

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        trace!(key, "memory store remove");
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
