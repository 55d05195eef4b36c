//! Pipeline behaviors (interceptors) wrapping request dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::request::{Request, RequestHandler};

/// A middleware stage wrapping the dispatch of one request type.
///
/// A behavior either short-circuits by returning without calling
/// [`Next::run`], or delegates and post-processes the result.
///
/// # Example
///
/// ```ignore
/// use pipecache_core::{DispatchError, Next, PipelineBehavior, Request};
///
/// struct Audit;
///
/// #[async_trait]
/// impl<R: Request> PipelineBehavior<R> for Audit {
///     async fn handle(
///         &self,
///         request: &R,
///         next: Next<'_, R>,
///         _cancel: &CancellationToken,
///     ) -> Result<R::Response, DispatchError> {
///         tracing::info!(?request, "dispatching");
///         next.run().await
///     }
/// }
/// ```
#[async_trait]
pub trait PipelineBehavior<R: Request>: Send + Sync {
    /// Intercepts `request`; `next` runs the rest of the pipeline.
    ///
    /// # Errors
    ///
    /// Propagates failures from the rest of the pipeline, or reports its own.
    async fn handle(
        &self,
        request: &R,
        next: Next<'_, R>,
        cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError>;
}

/// The remainder of a pipeline after the current behavior.
///
/// `run` consumes the value, so the rest of the pipeline executes at most
/// once per behavior invocation.
pub struct Next<'a, R: Request> {
    request: &'a R,
    cancel: &'a CancellationToken,
    behaviors: &'a [Arc<dyn PipelineBehavior<R>>],
    handler: &'a dyn RequestHandler<R>,
}

impl<'a, R: Request> Next<'a, R> {
    pub(crate) fn new(
        request: &'a R,
        cancel: &'a CancellationToken,
        behaviors: &'a [Arc<dyn PipelineBehavior<R>>],
        handler: &'a dyn RequestHandler<R>,
    ) -> Self {
        Self {
            request,
            cancel,
            behaviors,
            handler,
        }
    }

    /// Number of behaviors left before the handler.
    pub fn remaining(&self) -> usize {
        self.behaviors.len()
    }

    /// Runs the next behavior, or the handler when the chain is exhausted.
    ///
    /// # Errors
    ///
    /// Whatever the downstream stages return.
    pub async fn run(self) -> Result<R::Response, DispatchError> {
        let Next {
            request,
            cancel,
            behaviors,
            handler,
        } = self;

        match behaviors.split_first() {
            Some((behavior, rest)) => {
                behavior
                    .handle(request, Next::new(request, cancel, rest, handler), cancel)
                    .await
            },
            None => handler.handle(request, cancel).await,
        }
    }
}
