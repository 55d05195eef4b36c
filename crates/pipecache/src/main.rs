//! Pipecache demo binary.
//!
//! Wires a cached lookup and an invalidating command through the mediator
//! using the store selected by `pipecache.toml` / `PIPECACHE__*`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pipecache::cache::{CacheRegistry, ExpirationPolicy, KeyedStore, RegistrarConfig};
use pipecache::metrics::register_cache_metrics;
use pipecache::CacheSettings;
use pipecache_core::{CancellationToken, DispatchError, Mediator, Request, RequestHandler};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
struct GetGreeting {
    id: u32,
}

impl Request for GetGreeting {
    type Response = Greeting;

    fn name() -> &'static str {
        "demo.GetGreeting"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Greeting {
    text: String,
}

#[derive(Debug)]
struct ResetGreeting {
    id: u32,
}

impl Request for ResetGreeting {
    type Response = ();
}

#[derive(Default)]
struct GreetingHandler {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl RequestHandler<GetGreeting> for GreetingHandler {
    async fn handle(
        &self,
        request: &GetGreeting,
        _cancel: &CancellationToken,
    ) -> Result<Greeting, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Greeting {
            text: format!("hello {}", request.id),
        })
    }
}

struct ResetHandler;

#[async_trait]
impl RequestHandler<ResetGreeting> for ResetHandler {
    async fn handle(
        &self,
        _request: &ResetGreeting,
        _cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    register_cache_metrics();

    let settings = CacheSettings::load()?;
    tracing::info!(
        "Starting pipecache demo v{} with {:?} store",
        env!("CARGO_PKG_VERSION"),
        settings.provider
    );

    let store = settings.connect().await?;
    let mut registry =
        CacheRegistry::new(KeyedStore::new(store)).with_lookup_policy(settings.lookup);

    registry.register::<GetGreeting>(
        RegistrarConfig::builder()
            .retrieving(|r: &GetGreeting| r.id.to_string())
            .storing(|r: &GetGreeting, g: &Greeting| vec![r.id.to_string(), g.text.clone()])
            .expiration(ExpirationPolicy::Sliding(Duration::from_secs(3600)))
            .build()?,
    )?;
    registry.invalidate_with::<ResetGreeting, GetGreeting>(|r| r.id.to_string())?;

    let calls = Arc::new(AtomicU32::new(0));
    let builder = Mediator::builder()
        .handler(GreetingHandler {
            calls: calls.clone(),
        })
        .handler(ResetHandler);
    let mediator = registry.install(builder).build();

    let cancel = CancellationToken::new();
    for _ in 0..2 {
        let greeting = mediator.send(GetGreeting { id: 1 }, &cancel).await?;
        tracing::info!("Got {:?}", greeting);
    }

    mediator.send(ResetGreeting { id: 1 }, &cancel).await?;
    mediator.send(GetGreeting { id: 1 }, &cancel).await?;

    tracing::info!("Handler ran {} times", calls.load(Ordering::SeqCst));

    Ok(())
}
