//! Registration table wiring cache behaviors into a mediator.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use pipecache_core::{MediatorBuilder, Request};
use tracing::{debug, info};

use crate::cache::behavior::{CacheBehavior, LookupPolicy};
use crate::cache::envelope::{CacheValue, KeyedStore};
use crate::cache::invalidation::CacheInvalidationBehavior;
use crate::cache::registrar::{CacheRegistrar, RegistrarConfig};
use crate::cache::remover::{CacheRemover, Invalidator};
use crate::error::CacheError;

type Installer = fn(&CacheRegistry, &mut MediatorBuilder);

/// Startup registration of cached and invalidating request types.
///
/// Every request type gets at most one registrar. Invalidators can only be
/// attached to request types whose registrar is already registered, so a
/// broken wiring fails at startup instead of at request time.
///
/// # Example
///
/// ```ignore
/// let mut registry = CacheRegistry::new(KeyedStore::new(store));
///
/// registry.register::<GetOrder>(
///     RegistrarConfig::builder()
///         .retrieving(|r: &GetOrder| r.id.to_string())
///         .expiration(ExpirationPolicy::Sliding(Duration::from_secs(3600)))
///         .build()?,
/// )?;
/// registry.invalidate_with::<CancelOrder, GetOrder>(|c| c.id.to_string())?;
///
/// let mediator = registry
///     .install(Mediator::builder().handler(orders).handler(cancellations))
///     .build();
/// ```
pub struct CacheRegistry {
    store: KeyedStore,
    lookup: LookupPolicy,
    /// `Arc<CacheRegistrar<R>>` by request type.
    registrars: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    /// `Vec<Arc<dyn Invalidator<C>>>` by request type.
    invalidators: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    cache_installers: Vec<Installer>,
    invalidation_installers: Vec<Installer>,
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("store", &self.store)
            .field("lookup", &self.lookup)
            .field("cached_types", &self.registrars.len())
            .field("invalidating_types", &self.invalidators.len())
            .finish()
    }
}

impl CacheRegistry {
    /// Creates an empty registry over `store`.
    pub fn new(store: KeyedStore) -> Self {
        Self {
            store,
            lookup: LookupPolicy::default(),
            registrars: HashMap::new(),
            invalidators: HashMap::new(),
            cache_installers: Vec::new(),
            invalidation_installers: Vec::new(),
        }
    }

    /// Sets the lookup failure policy for every cached type.
    pub fn with_lookup_policy(mut self, lookup: LookupPolicy) -> Self {
        self.lookup = lookup;
        self
    }

    /// Returns the lookup failure policy.
    pub fn lookup_policy(&self) -> LookupPolicy {
        self.lookup
    }

    /// Returns the shared keyed store.
    pub fn store(&self) -> &KeyedStore {
        &self.store
    }

    /// Registers the cache registrar of `R`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::DuplicateRegistrar` if `R` already has one.
    pub fn register<R>(
        &mut self,
        config: RegistrarConfig<R>,
    ) -> Result<Arc<CacheRegistrar<R>>, CacheError>
    where
        R: Request,
        R::Response: CacheValue,
    {
        let type_id = TypeId::of::<R>();
        if self.registrars.contains_key(&type_id) {
            return Err(CacheError::DuplicateRegistrar { request: R::name() });
        }

        debug!(request = R::name(), expiration = ?config.expiration(), "Registering cache registrar");

        let registrar = Arc::new(CacheRegistrar::new(config, self.store.clone()));
        self.registrars
            .insert(type_id, Box::new(Arc::clone(&registrar)));
        self.cache_installers.push(install_cache::<R>);

        Ok(registrar)
    }

    /// Returns the registrar of `R`, if registered.
    pub fn registrar<R>(&self) -> Option<Arc<CacheRegistrar<R>>>
    where
        R: Request,
        R::Response: CacheValue,
    {
        self.registrars
            .get(&TypeId::of::<R>())
            .and_then(|entry| entry.downcast_ref::<Arc<CacheRegistrar<R>>>())
            .cloned()
    }

    /// Returns true if `R` has a registrar.
    pub fn is_cached<R: Request>(&self) -> bool {
        self.registrars.contains_key(&TypeId::of::<R>())
    }

    /// Removes the `Q` entry identified by `identifier` after every `C`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::MissingRegistrar` if `Q` has no registrar yet.
    pub fn invalidate_with<C, Q>(
        &mut self,
        identifier: impl Fn(&C) -> String + Send + Sync + 'static,
    ) -> Result<(), CacheError>
    where
        C: Request,
        Q: Request,
        Q::Response: CacheValue,
    {
        let registrar = self
            .registrar::<Q>()
            .ok_or(CacheError::MissingRegistrar {
                invalidator: C::name(),
                target: Q::name(),
            })?;

        self.add_invalidator::<C>(Arc::new(CacheRemover::<C, Q>::new(registrar, identifier)));
        Ok(())
    }

    /// Appends a custom invalidator for `C`.
    pub fn add_invalidator<C: Request>(&mut self, invalidator: Arc<dyn Invalidator<C>>) {
        let type_id = TypeId::of::<C>();
        if !self.invalidators.contains_key(&type_id) {
            let removers: Vec<Arc<dyn Invalidator<C>>> = Vec::new();
            self.invalidators.insert(type_id, Box::new(removers));
            self.invalidation_installers.push(install_invalidation::<C>);
        }

        debug!(request = C::name(), target_request = invalidator.target(), "Registering cache remover");

        if let Some(removers) = self
            .invalidators
            .get_mut(&type_id)
            .and_then(|entry| entry.downcast_mut::<Vec<Arc<dyn Invalidator<C>>>>())
        {
            removers.push(invalidator);
        }
    }

    /// Returns the number of invalidators registered for `C`.
    pub fn invalidator_count<C: Request>(&self) -> usize {
        self.invalidators::<C>().len()
    }

    fn invalidators<C: Request>(&self) -> Vec<Arc<dyn Invalidator<C>>> {
        self.invalidators
            .get(&TypeId::of::<C>())
            .and_then(|entry| entry.downcast_ref::<Vec<Arc<dyn Invalidator<C>>>>())
            .cloned()
            .unwrap_or_default()
    }

    /// Adds the cache behaviors to `builder`.
    ///
    /// Invalidation behaviors are added first, so for a type that is both
    /// cached and invalidating, invalidation wraps the cache lookup.
    pub fn install(&self, mut builder: MediatorBuilder) -> MediatorBuilder {
        for install in &self.invalidation_installers {
            install(self, &mut builder);
        }
        for install in &self.cache_installers {
            install(self, &mut builder);
        }

        info!(
            cached = self.cache_installers.len(),
            invalidating = self.invalidation_installers.len(),
            "Cache behaviors installed"
        );

        builder
    }
}

fn install_cache<R>(registry: &CacheRegistry, builder: &mut MediatorBuilder)
where
    R: Request,
    R::Response: CacheValue,
{
    if let Some(registrar) = registry.registrar::<R>() {
        let behavior = CacheBehavior::new(registrar).with_lookup_policy(registry.lookup);
        builder.add_behavior::<R>(Arc::new(behavior));
    }
}

fn install_invalidation<C: Request>(registry: &CacheRegistry, builder: &mut MediatorBuilder) {
    let removers = registry.invalidators::<C>();
    if !removers.is_empty() {
        builder.add_behavior::<C>(Arc::new(CacheInvalidationBehavior::new(removers)));
    }
}
