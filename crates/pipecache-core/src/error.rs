//! Error types for request dispatch.

/// Boxed error produced by a handler or a pipeline behavior.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while dispatching a request through the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No handler was registered for the request type.
    #[error("no handler registered for request {request}")]
    HandlerNotFound {
        /// Type name of the request.
        request: &'static str,
    },

    /// The caller cancelled the dispatch.
    #[error("request cancelled")]
    Cancelled,

    /// The handler or a behavior failed.
    #[error(transparent)]
    Failed(BoxError),
}

impl DispatchError {
    /// Wraps any error raised by a handler or behavior.
    pub fn failed(err: impl Into<BoxError>) -> Self {
        Self::Failed(err.into())
    }

    /// Creates a handler-not-found error for the given request name.
    pub fn handler_not_found(request: &'static str) -> Self {
        Self::HandlerNotFound { request }
    }

    /// Returns true if the dispatch was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Attempts to downcast the wrapped failure to a concrete error type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Failed(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}
