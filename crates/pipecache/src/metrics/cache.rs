//! Cache metrics recording.

use metrics::{counter, histogram};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Registra las metricas de cache.
/// Llamar una vez al inicio para registrar las metricas.
pub fn register_cache_metrics() {
    metrics::describe_counter!("pipecache_cache_hits_total", "Total number of cache hits");
    metrics::describe_counter!("pipecache_cache_misses_total", "Total number of cache misses");
    metrics::describe_counter!(
        "pipecache_cache_invalidations_total",
        "Total number of cache entries removed by invalidating requests"
    );
    metrics::describe_histogram!(
        "pipecache_cache_operation_seconds",
        "Time spent on cache operations"
    );
}

/// Recorder de metricas de cache para un tipo de request.
/// Usa atomic counters internos; los clones comparten contadores.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    request: &'static str,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    invalidations: Arc<AtomicU64>,
}

impl CacheMetrics {
    pub fn new(request: &'static str) -> Self {
        Self {
            request,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            invalidations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registra un cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!("pipecache_cache_hits_total", "request" => self.request).increment(1);
    }

    /// Registra un cache miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("pipecache_cache_misses_total", "request" => self.request).increment(1);
    }

    /// Registra una invalidacion
    pub fn record_invalidation(&self, target: &'static str) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        counter!(
            "pipecache_cache_invalidations_total",
            "request" => self.request,
            "target" => target
        )
        .increment(1);
    }

    /// Registra la duracion de una operacion
    pub fn record_operation_duration(&self, operation: &'static str, duration: Duration) {
        histogram!(
            "pipecache_cache_operation_seconds",
            "request" => self.request,
            "operation" => operation
        )
        .record(duration.as_secs_f64());
    }

    /// Calcula hit rate (para logging/debugging)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }

    /// Retorna el tipo de request medido
    pub fn request(&self) -> &'static str {
        self.request
    }

    /// Retorna el numero de hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Retorna el numero de misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Retorna el numero de invalidaciones
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }
}
