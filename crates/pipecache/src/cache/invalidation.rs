//! Cache invalidation pipeline behavior.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use pipecache_core::{CancellationToken, DispatchError, Next, PipelineBehavior, Request};
use tracing::{debug, warn};

use crate::cache::remover::Invalidator;
use crate::error::CacheError;
use crate::metrics::CacheMetrics;

/// Runs the request, then every remover registered for its type.
///
/// Removers only run after the rest of the pipeline succeeds, in
/// registration order. A failing remover does not stop the others; the
/// failures are returned together once all of them ran.
pub struct CacheInvalidationBehavior<R: Request> {
    removers: Vec<Arc<dyn Invalidator<R>>>,
    metrics: CacheMetrics,
}

impl<R: Request> fmt::Debug for CacheInvalidationBehavior<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let targets: Vec<&'static str> = self.removers.iter().map(|r| r.target()).collect();
        f.debug_struct("CacheInvalidationBehavior")
            .field("request", &R::name())
            .field("targets", &targets)
            .finish()
    }
}

impl<R: Request> CacheInvalidationBehavior<R> {
    /// Creates a behavior running `removers` in order.
    pub fn new(removers: Vec<Arc<dyn Invalidator<R>>>) -> Self {
        Self {
            removers,
            metrics: CacheMetrics::new(R::name()),
        }
    }

    /// Returns the number of removers.
    pub fn len(&self) -> usize {
        self.removers.len()
    }

    /// Returns true if no remover is registered.
    pub fn is_empty(&self) -> bool {
        self.removers.is_empty()
    }

    /// Returns the metrics recorder.
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }
}

#[async_trait]
impl<R: Request> PipelineBehavior<R> for CacheInvalidationBehavior<R> {
    async fn handle(
        &self,
        request: &R,
        next: Next<'_, R>,
        cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        let response = next.run().await?;

        let mut failures = Vec::new();
        for remover in &self.removers {
            debug!(target_request = remover.target(), "Removing cache after getting {}", R::name());

            let start = Instant::now();
            match remover.invalidate(request, cancel).await {
                Ok(()) => {
                    self.metrics.record_invalidation(remover.target());
                    self.metrics
                        .record_operation_duration("invalidate", start.elapsed());
                },
                Err(CacheError::Cancelled) => return Err(DispatchError::Cancelled),
                Err(err) => {
                    warn!(
                        request = R::name(),
                        target_request = remover.target(),
                        error = %err,
                        "Cache remover failed"
                    );
                    failures.push(err);
                },
            }
        }

        if !failures.is_empty() {
            return Err(CacheError::Invalidation {
                request: R::name(),
                failures,
            }
            .into());
        }

        Ok(response)
    }
}
