//! Mediator: the dispatcher that routes requests through their pipelines.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::error::DispatchError;
use crate::pipeline::{Next, PipelineBehavior};
use crate::request::{Request, RequestHandler};

/// Handler and behavior chain registered for one request type.
struct Pipeline<R: Request> {
    handler: Option<Arc<dyn RequestHandler<R>>>,
    behaviors: Vec<Arc<dyn PipelineBehavior<R>>>,
}

impl<R: Request> Default for Pipeline<R> {
    fn default() -> Self {
        Self {
            handler: None,
            behaviors: Vec::new(),
        }
    }
}

/// Dispatches requests to their handler through the registered behaviors.
///
/// Built once at startup through [`MediatorBuilder`]; the registration table
/// is immutable afterwards, so a `Mediator` can be shared freely behind an
/// `Arc`.
///
/// # Example
///
/// ```ignore
/// let mediator = Mediator::builder()
///     .handler(GetUserHandler::new(repo))
///     .behavior::<GetUser>(AuditBehavior)
///     .build();
///
/// let user = mediator.send(GetUser { id: 1 }, &CancellationToken::new()).await?;
/// ```
pub struct Mediator {
    pipelines: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Mediator {
    /// Creates a new builder.
    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::default()
    }

    /// Returns true if a handler is registered for `R`.
    pub fn has_handler<R: Request>(&self) -> bool {
        self.pipeline::<R>()
            .is_some_and(|pipeline| pipeline.handler.is_some())
    }

    /// Number of behaviors wrapping the handler of `R`.
    pub fn behavior_count<R: Request>(&self) -> usize {
        self.pipeline::<R>()
            .map_or(0, |pipeline| pipeline.behaviors.len())
    }

    /// Sends `request` through its pipeline.
    ///
    /// Cancellation is observed while any stage is pending: the pipeline
    /// future is dropped and `DispatchError::Cancelled` is returned.
    ///
    /// # Errors
    ///
    /// - `DispatchError::HandlerNotFound` if no handler is registered for `R`
    /// - `DispatchError::Cancelled` if `cancel` fires before completion
    /// - any error produced by a behavior or the handler
    pub async fn send<R: Request>(
        &self,
        request: R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        let pipeline = self
            .pipeline::<R>()
            .ok_or_else(|| DispatchError::handler_not_found(R::name()))?;
        let handler = pipeline
            .handler
            .as_deref()
            .ok_or_else(|| DispatchError::handler_not_found(R::name()))?;

        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }

        trace!(request = R::name(), behaviors = pipeline.behaviors.len(), "Dispatching request");

        let next = Next::new(&request, cancel, &pipeline.behaviors, handler);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DispatchError::Cancelled),
            result = next.run() => result,
        }
    }

    fn pipeline<R: Request>(&self) -> Option<&Pipeline<R>> {
        self.pipelines
            .get(&TypeId::of::<R>())
            .and_then(|slot| slot.downcast_ref::<Pipeline<R>>())
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("request_types", &self.pipelines.len())
            .finish()
    }
}

/// Builder for [`Mediator`].
#[derive(Default)]
pub struct MediatorBuilder {
    pipelines: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MediatorBuilder {
    /// Registers the handler for `R`, replacing any previous one.
    pub fn handler<R: Request>(mut self, handler: impl RequestHandler<R> + 'static) -> Self {
        self.add_handler::<R>(Arc::new(handler));
        self
    }

    /// Appends a behavior to the pipeline of `R`.
    ///
    /// Behaviors registered first run outermost.
    pub fn behavior<R: Request>(mut self, behavior: impl PipelineBehavior<R> + 'static) -> Self {
        self.add_behavior::<R>(Arc::new(behavior));
        self
    }

    /// Registers a shared handler for `R`, replacing any previous one.
    pub fn add_handler<R: Request>(&mut self, handler: Arc<dyn RequestHandler<R>>) {
        let pipeline = self.pipeline_mut::<R>();
        if pipeline.handler.replace(handler).is_some() {
            warn!(request = R::name(), "Replacing previously registered handler");
        }
    }

    /// Appends a shared behavior to the pipeline of `R`.
    pub fn add_behavior<R: Request>(&mut self, behavior: Arc<dyn PipelineBehavior<R>>) {
        self.pipeline_mut::<R>().behaviors.push(behavior);
    }

    /// Finalizes the registration table.
    pub fn build(self) -> Mediator {
        Mediator {
            pipelines: self.pipelines,
        }
    }

    fn pipeline_mut<R: Request>(&mut self) -> &mut Pipeline<R> {
        let slot = self
            .pipelines
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(Pipeline::<R>::default()));

        match slot.downcast_mut::<Pipeline<R>>() {
            Some(pipeline) => pipeline,
            // Slots are keyed by TypeId::of::<R>() and only ever hold Pipeline<R>.
            None => unreachable!("pipeline slot type mismatch for {}", R::name()),
        }
    }
}
