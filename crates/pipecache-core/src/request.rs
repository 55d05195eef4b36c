//! Request and handler contracts.

use std::fmt::Debug;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;

/// An immutable request flowing through the dispatcher.
///
/// Each request type is bound to exactly one response type. Several request
/// types may share the same response type.
///
/// # Example
///
/// ```
/// use pipecache_core::Request;
///
/// #[derive(Debug)]
/// struct GetUser {
///     id: u64,
/// }
///
/// impl Request for GetUser {
///     type Response = String;
/// }
///
/// assert!(GetUser::name().ends_with("GetUser"));
/// ```
pub trait Request: Debug + Send + Sync + 'static {
    /// The value produced by handling this request.
    type Response: Send + 'static;

    /// Stable name of the request type, used as a cache key namespace.
    ///
    /// Defaults to the fully qualified Rust type name. Override it to keep
    /// keys stable when the type is moved between modules.
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Handles one request type. This is the innermost stage of a pipeline.
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    /// Produces the response for `request`.
    ///
    /// # Errors
    ///
    /// Any business failure, wrapped with [`DispatchError::failed`].
    async fn handle(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError>;
}
