//! # Pipecache Core
//!
//! Request dispatcher with an ordered interceptor chain.
//!
//! Every request type is registered with exactly one [`RequestHandler`] and
//! any number of [`PipelineBehavior`]s. Behaviors wrap the handler in
//! registration order and may either short-circuit the dispatch or delegate
//! to the rest of the chain and post-process its result.
//!
//! ## Example
//!
//! ```ignore
//! use pipecache_core::{CancellationToken, Mediator, Request};
//!
//! #[derive(Debug)]
//! struct GetUser { id: u64 }
//!
//! impl Request for GetUser {
//!     type Response = User;
//! }
//!
//! let mediator = Mediator::builder()
//!     .handler(GetUserHandler::new(repo))
//!     .build();
//!
//! let user = mediator.send(GetUser { id: 1 }, &CancellationToken::new()).await?;
//! ```

pub mod error;
pub mod mediator;
pub mod pipeline;
pub mod request;

// Re-exports
pub use error::{BoxError, DispatchError};
pub use mediator::{Mediator, MediatorBuilder};
pub use pipeline::{Next, PipelineBehavior};
pub use request::{Request, RequestHandler};
pub use tokio_util::sync::CancellationToken;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
