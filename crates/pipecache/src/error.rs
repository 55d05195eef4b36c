//! Error types for the caching layer.

use std::fmt;

use pipecache_core::DispatchError;
use pipecache_store::StoreError;

/// One failed key of a fan-out store operation.
#[derive(Debug)]
pub struct KeyFailure {
    /// The key that failed.
    pub key: String,
    /// Why it failed.
    pub source: StoreError,
}

impl fmt::Display for KeyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.source)
    }
}

/// Errores del sistema de cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backing store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A value could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Some writes or deletes of a multi-key operation failed.
    /// Keys that succeeded are not rolled back.
    #[error("{operation} failed for {} of {total} keys: {}", .failures.len(), join(.failures))]
    FanOut {
        operation: &'static str,
        total: usize,
        failures: Vec<KeyFailure>,
    },

    /// One or more removers failed after the request completed.
    #[error("{} cache removers failed after {request}: {}", .failures.len(), join(.failures))]
    Invalidation {
        request: &'static str,
        failures: Vec<CacheError>,
    },

    /// The storing identifier function returned nothing.
    #[error("no storing keys produced for {request}")]
    NoStoringKeys { request: &'static str },

    /// A registrar is already registered for the request type.
    #[error("a cache registrar is already registered for {request}")]
    DuplicateRegistrar { request: &'static str },

    /// An invalidator targets a request type without a registrar.
    #[error("{invalidator} invalidates {target}, which has no cache registrar")]
    MissingRegistrar {
        invalidator: &'static str,
        target: &'static str,
    },

    /// Invalid cache configuration.
    #[error("invalid cache configuration: {0}")]
    Config(String),

    /// The operation was cancelled.
    #[error("cache operation cancelled")]
    Cancelled,
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CacheError {
    /// Creates a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true if the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if retrying might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(err) => err.is_transient(),
            Self::FanOut { failures, .. } => failures.iter().all(|f| f.source.is_transient()),
            Self::Invalidation { failures, .. } => failures.iter().all(CacheError::is_transient),
            _ => false,
        }
    }
}

impl From<CacheError> for DispatchError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Cancelled => DispatchError::Cancelled,
            other => DispatchError::failed(other),
        }
    }
}
