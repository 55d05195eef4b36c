//! Get-or-populate pipeline behavior.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use pipecache_core::{CancellationToken, DispatchError, Next, PipelineBehavior, Request};
use tracing::{debug, warn};

use crate::cache::envelope::CacheValue;
use crate::cache::registrar::CacheRegistrar;
use crate::metrics::CacheMetrics;

/// What to do when the store fails while serving a cached request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LookupPolicy {
    /// Fail the dispatch with the store error.
    #[default]
    Propagate,
    /// Log a warning, run the handler as on a miss and return its response
    /// even if it cannot be cached.
    TreatAsMiss,
}

/// Serves cached responses and caches fresh ones.
///
/// On a hit the rest of the pipeline does not run. On a miss the response
/// is stored only after the rest of the pipeline succeeds.
pub struct CacheBehavior<R: Request> {
    registrar: Arc<CacheRegistrar<R>>,
    lookup: LookupPolicy,
    metrics: CacheMetrics,
}

impl<R: Request> fmt::Debug for CacheBehavior<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBehavior")
            .field("request", &R::name())
            .field("lookup", &self.lookup)
            .finish()
    }
}

impl<R> CacheBehavior<R>
where
    R: Request,
    R::Response: CacheValue,
{
    /// Creates a behavior caching through `registrar`.
    pub fn new(registrar: Arc<CacheRegistrar<R>>) -> Self {
        Self {
            registrar,
            lookup: LookupPolicy::default(),
            metrics: CacheMetrics::new(R::name()),
        }
    }

    /// Sets the lookup failure policy.
    pub fn with_lookup_policy(mut self, lookup: LookupPolicy) -> Self {
        self.lookup = lookup;
        self
    }

    /// Returns the metrics recorder.
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }
}

#[async_trait]
impl<R> PipelineBehavior<R> for CacheBehavior<R>
where
    R: Request,
    R::Response: CacheValue,
{
    async fn handle(
        &self,
        request: &R,
        next: Next<'_, R>,
        cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        let registrar = &self.registrar;
        let start = Instant::now();
        match registrar.get(request, cancel).await {
            Ok(Some(cached)) => {
                self.metrics.record_hit();
                self.metrics
                    .record_operation_duration("get", start.elapsed());
                debug!("Cache hit, returning {:?} for {:?}", cached, request);
                return Ok(cached);
            },
            Ok(None) => {},
            Err(err) if err.is_cancelled() || self.lookup == LookupPolicy::Propagate => {
                return Err(err.into());
            },
            Err(err) => {
                warn!(request = R::name(), error = %err, "Cache lookup failed, treating as miss");
            },
        }

        let response = next.run().await?;
        self.metrics.record_miss();

        let start = Instant::now();
        match registrar.set(request, &response, cancel).await {
            Ok(()) => {
                self.metrics
                    .record_operation_duration("set", start.elapsed());
            },
            Err(err) if err.is_cancelled() || self.lookup == LookupPolicy::Propagate => {
                return Err(err.into());
            },
            Err(err) => {
                warn!(request = R::name(), error = %err, "Cache population failed, returning response uncached");
                return Ok(response);
            },
        }

        debug!("Cache miss, saving {:?} to cache for {:?}", response, request);
        Ok(response)
    }
}
