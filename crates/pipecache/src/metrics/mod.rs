//! Metrics for the caching layer.

pub mod cache;

pub use cache::{CacheMetrics, register_cache_metrics};
