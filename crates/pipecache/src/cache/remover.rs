//! Cross-request cache invalidation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use pipecache_core::{CancellationToken, Request};

use crate::cache::envelope::CacheValue;
use crate::cache::registrar::CacheRegistrar;
use crate::error::CacheError;

/// Removes cached entries after a request of type `R` completes.
///
/// # Implementors
///
/// - `CacheRemover` - Removes one entry of a cached request type
#[async_trait]
pub trait Invalidator<R: Request>: Send + Sync {
    /// Removes whatever `request` invalidates.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Cancelled` if `cancel` fires, or the store error.
    async fn invalidate(&self, request: &R, cancel: &CancellationToken) -> Result<(), CacheError>;

    /// Type name of the cached request whose entries are removed.
    fn target(&self) -> &'static str;
}

/// Removes `Q` entries when a `C` request completes.
///
/// The identifier derived from `C` must match one of the identifiers `Q`
/// stores its entries under. Any one of them is enough, since removal
/// cascades to sibling keys.
pub struct CacheRemover<C: Request, Q: Request> {
    registrar: Arc<CacheRegistrar<Q>>,
    identifier: Box<dyn Fn(&C) -> String + Send + Sync>,
}

impl<C: Request, Q: Request> fmt::Debug for CacheRemover<C, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRemover")
            .field("invalidator", &C::name())
            .field("target", &Q::name())
            .finish()
    }
}

impl<C, Q> CacheRemover<C, Q>
where
    C: Request,
    Q: Request,
    Q::Response: CacheValue,
{
    /// Creates a remover over `Q`'s registrar.
    pub fn new(
        registrar: Arc<CacheRegistrar<Q>>,
        identifier: impl Fn(&C) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            registrar,
            identifier: Box::new(identifier),
        }
    }

    /// Returns the identifier of the `Q` entry that `request` invalidates.
    pub fn retrieving_identifier(&self, request: &C) -> String {
        (self.identifier)(request)
    }

    /// Removes the `Q` entry that `request` invalidates.
    pub async fn remove(&self, request: &C, cancel: &CancellationToken) -> Result<(), CacheError> {
        let identifier = self.retrieving_identifier(request);
        self.registrar.remove(&identifier, cancel).await
    }
}

#[async_trait]
impl<C, Q> Invalidator<C> for CacheRemover<C, Q>
where
    C: Request,
    Q: Request,
    Q::Response: CacheValue,
{
    async fn invalidate(&self, request: &C, cancel: &CancellationToken) -> Result<(), CacheError> {
        self.remove(request, cancel).await
    }

    fn target(&self) -> &'static str {
        Q::name()
    }
}
