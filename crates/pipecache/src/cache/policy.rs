//! Expiration policies for cached entries.

use std::time::Duration;

use chrono::{DateTime, Utc};
use pipecache_store::EntryOptions;

/// How long a cached entry stays valid.
///
/// One policy applies per registrar. The store enforces it: this layer
/// never evicts on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpirationPolicy {
    /// Lives until removed explicitly.
    #[default]
    Never,
    /// Expires at a fixed instant.
    At(DateTime<Utc>),
    /// Expires a fixed duration after each write.
    AfterWrite(Duration),
    /// Expires once unread for the given window. Every hit resets it.
    Sliding(Duration),
}

impl ExpirationPolicy {
    /// Maps the policy onto store entry options.
    pub fn to_entry_options(&self) -> EntryOptions {
        match *self {
            Self::Never => EntryOptions::new(),
            Self::At(at) => EntryOptions::new().with_absolute_expiration(at),
            Self::AfterWrite(ttl) => EntryOptions::new().with_absolute_expiration_relative_to_now(ttl),
            Self::Sliding(window) => EntryOptions::new().with_sliding_expiration(window),
        }
    }
}
