//! Per-request-type cache strategy.

use std::fmt;
use std::sync::Arc;

use pipecache_core::{CancellationToken, Request};
use tracing::trace;

use crate::cache::envelope::{CacheValue, KeyedStore};
use crate::cache::keys::{CacheKey, dedup_keys};
use crate::cache::policy::ExpirationPolicy;
use crate::error::CacheError;

type RetrievingFn<R> = Arc<dyn Fn(&R) -> String + Send + Sync>;
type StoringFn<R> = Arc<dyn Fn(&R, &<R as Request>::Response) -> Vec<String> + Send + Sync>;

/// How a request type is cached: key derivation plus expiration.
pub struct RegistrarConfig<R: Request> {
    retrieving: RetrievingFn<R>,
    storing: Option<StoringFn<R>>,
    expiration: ExpirationPolicy,
}

impl<R: Request> RegistrarConfig<R> {
    /// Creates a new configuration builder.
    pub fn builder() -> RegistrarConfigBuilder<R> {
        RegistrarConfigBuilder::default()
    }

    /// Returns the expiration policy.
    pub fn expiration(&self) -> ExpirationPolicy {
        self.expiration
    }
}

impl<R: Request> Clone for RegistrarConfig<R> {
    fn clone(&self) -> Self {
        Self {
            retrieving: Arc::clone(&self.retrieving),
            storing: self.storing.clone(),
            expiration: self.expiration,
        }
    }
}

impl<R: Request> fmt::Debug for RegistrarConfig<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrarConfig")
            .field("request", &R::name())
            .field("custom_storing", &self.storing.is_some())
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Builder for [`RegistrarConfig`].
pub struct RegistrarConfigBuilder<R: Request> {
    retrieving: Option<RetrievingFn<R>>,
    storing: Option<StoringFn<R>>,
    expiration: ExpirationPolicy,
}

impl<R: Request> Default for RegistrarConfigBuilder<R> {
    fn default() -> Self {
        Self {
            retrieving: None,
            storing: None,
            expiration: ExpirationPolicy::default(),
        }
    }
}

impl<R: Request> RegistrarConfigBuilder<R> {
    /// Sets the lookup identifier derivation.
    ///
    /// Must be deterministic: equal requests yield equal identifiers.
    pub fn retrieving(mut self, f: impl Fn(&R) -> String + Send + Sync + 'static) -> Self {
        self.retrieving = Some(Arc::new(f));
        self
    }

    /// Sets the storing identifiers derivation.
    ///
    /// The result should include the retrieving identifier of the request,
    /// plus any secondary identifiers the response is reachable by. When
    /// unset, entries are stored under the retrieving identifier only.
    pub fn storing(
        mut self,
        f: impl Fn(&R, &R::Response) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.storing = Some(Arc::new(f));
        self
    }

    /// Sets the expiration policy.
    pub fn expiration(mut self, policy: ExpirationPolicy) -> Self {
        self.expiration = policy;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Config` if no retrieving function was set.
    pub fn build(self) -> Result<RegistrarConfig<R>, CacheError> {
        let retrieving = self.retrieving.ok_or_else(|| {
            CacheError::config(format!(
                "retrieving identifier is required for {}",
                R::name()
            ))
        })?;

        Ok(RegistrarConfig {
            retrieving,
            storing: self.storing,
            expiration: self.expiration,
        })
    }
}

/// Cache registrar for one request type.
///
/// Keys are namespaced by the request type name, so every key has the form
/// `{R::name()}:{identifier}`.
pub struct CacheRegistrar<R: Request> {
    config: RegistrarConfig<R>,
    store: KeyedStore,
}

impl<R: Request> fmt::Debug for CacheRegistrar<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistrar")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish()
    }
}

impl<R> CacheRegistrar<R>
where
    R: Request,
    R::Response: CacheValue,
{
    /// Creates a registrar over `store`.
    pub fn new(config: RegistrarConfig<R>, store: KeyedStore) -> Self {
        Self { config, store }
    }

    /// Returns the lookup identifier for `request`.
    pub fn retrieving_identifier(&self, request: &R) -> String {
        (self.config.retrieving)(request)
    }

    /// Returns the storing identifiers for a request/response pair.
    pub fn storing_identifiers(&self, request: &R, response: &R::Response) -> Vec<String> {
        match &self.config.storing {
            Some(storing) => storing(request, response),
            None => vec![self.retrieving_identifier(request)],
        }
    }

    /// Returns the lookup key for `request`.
    pub fn retrieving_key(&self, request: &R) -> CacheKey {
        CacheKey::for_request::<R>(&self.retrieving_identifier(request))
    }

    /// Returns the distinct storing keys, in derivation order.
    pub fn storing_keys(&self, request: &R, response: &R::Response) -> Vec<CacheKey> {
        dedup_keys(
            self.storing_identifiers(request, response)
                .iter()
                .map(|id| CacheKey::for_request::<R>(id)),
        )
    }

    /// Returns the expiration policy.
    pub fn expiration(&self) -> ExpirationPolicy {
        self.config.expiration
    }

    /// Returns the keyed store.
    pub fn store(&self) -> &KeyedStore {
        &self.store
    }

    /// Looks up the cached response for `request`.
    pub async fn get(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<Option<R::Response>, CacheError> {
        let key = self.retrieving_key(request);
        self.store.get(&key, cancel).await
    }

    /// Stores `response` under every storing key of the pair.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NoStoringKeys` if the storing function yields
    /// nothing, plus any store error.
    pub async fn set(
        &self,
        request: &R,
        response: &R::Response,
        cancel: &CancellationToken,
    ) -> Result<(), CacheError> {
        let keys = self.storing_keys(request, response);
        if keys.is_empty() {
            return Err(CacheError::NoStoringKeys { request: R::name() });
        }

        let options = self.config.expiration.to_entry_options();
        self.store.set(response, &keys, &options, cancel).await?;

        trace!(request = R::name(), keys = keys.len(), "registrar stored entry");
        Ok(())
    }

    /// Removes the entry stored under `identifier` and all of its siblings.
    pub async fn remove(&self, identifier: &str, cancel: &CancellationToken) -> Result<(), CacheError> {
        let key = CacheKey::for_request::<R>(identifier);
        self.store.remove(&key, cancel).await
    }
}
