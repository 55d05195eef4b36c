//! Test helpers para pipecache.

#![allow(dead_code, unused_imports)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pipecache::cache::{CacheRegistry, ExpirationPolicy, KeyedStore, LookupPolicy, RegistrarConfig};
use pipecache_core::{CancellationToken, DispatchError, Mediator, Request, RequestHandler};
use pipecache_store::{EntryOptions, KeyValueStore, MemoryStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Cached lookup.
#[derive(Debug, Clone)]
pub struct Query {
    pub id: u32,
}

impl Request for Query {
    type Response = QueryResult;

    fn name() -> &'static str {
        "Query"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub name: String,
}

impl QueryResult {
    pub fn for_id(id: u32) -> Self {
        Self {
            name: format!("result {}", id),
        }
    }
}

/// Request that invalidates `Query`.
#[derive(Debug, Clone)]
pub struct Command {
    pub id: u32,
}

impl Request for Command {
    type Response = String;

    fn name() -> &'static str {
        "Command"
    }
}

/// Request that is never cached.
#[derive(Debug, Clone)]
pub struct Ping;

impl Request for Ping {
    type Response = String;
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Counts calls and optionally fails or stalls.
#[derive(Clone, Default)]
pub struct Spy {
    calls: Arc<AtomicU32>,
    fail: Arc<AtomicBool>,
    delay: Option<Duration>,
}

impl Spy {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn enter(&self) -> Result<(), DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError::failed(std::io::Error::other("handler failed")));
        }
        Ok(())
    }
}

pub struct QueryHandler(pub Spy);

#[async_trait]
impl RequestHandler<Query> for QueryHandler {
    async fn handle(&self, request: &Query, _: &CancellationToken) -> Result<QueryResult, DispatchError> {
        self.0.enter().await?;
        Ok(QueryResult::for_id(request.id))
    }
}

pub struct CommandHandler(pub Spy);

#[async_trait]
impl RequestHandler<Command> for CommandHandler {
    async fn handle(&self, request: &Command, _: &CancellationToken) -> Result<String, DispatchError> {
        self.0.enter().await?;
        Ok(format!("command {} done", request.id))
    }
}

pub struct PingHandler(pub Spy);

#[async_trait]
impl RequestHandler<Ping> for PingHandler {
    async fn handle(&self, _: &Ping, _: &CancellationToken) -> Result<String, DispatchError> {
        self.0.enter().await?;
        Ok("pong".to_string())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// A mediator with `Query` cached by id and name, `Command` invalidating it
/// by id, and `Ping` left uncached.
pub struct Harness {
    pub mediator: Mediator,
    pub keyed: KeyedStore,
    pub query: Spy,
    pub command: Spy,
    pub ping: Spy,
}

impl Harness {
    pub fn new(store: Arc<dyn KeyValueStore>, expiration: ExpirationPolicy) -> Self {
        Self::build(store, expiration, LookupPolicy::Propagate, Spy::default())
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), ExpirationPolicy::Never)
    }

    pub fn build(
        store: Arc<dyn KeyValueStore>,
        expiration: ExpirationPolicy,
        lookup: LookupPolicy,
        query: Spy,
    ) -> Self {
        let keyed = KeyedStore::new(store);
        let mut registry = CacheRegistry::new(keyed.clone()).with_lookup_policy(lookup);

        registry
            .register::<Query>(
                RegistrarConfig::builder()
                    .retrieving(|q: &Query| q.id.to_string())
                    .storing(|q: &Query, r: &QueryResult| vec![q.id.to_string(), r.name.clone()])
                    .expiration(expiration)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .invalidate_with::<Command, Query>(|c| c.id.to_string())
            .unwrap();

        let command = Spy::default();
        let ping = Spy::default();
        let builder = Mediator::builder()
            .handler(QueryHandler(query.clone()))
            .handler(CommandHandler(command.clone()))
            .handler(PingHandler(ping.clone()));

        Self {
            mediator: registry.install(builder).build(),
            keyed,
            query,
            command,
            ping,
        }
    }

    pub async fn query(&self, id: u32) -> Result<QueryResult, DispatchError> {
        self.mediator
            .send(Query { id }, &CancellationToken::new())
            .await
    }

    pub async fn command(&self, id: u32) -> Result<String, DispatchError> {
        self.mediator
            .send(Command { id }, &CancellationToken::new())
            .await
    }

    /// Reads a cached `Query` entry directly from the store.
    pub async fn cached(&self, identifier: &str) -> Option<QueryResult> {
        self.keyed
            .get(
                &pipecache::CacheKey::for_request::<Query>(identifier),
                &CancellationToken::new(),
            )
            .await
            .unwrap()
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Memory store with switchable failures.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_removes: AtomicBool,
    failing_writes: Mutex<HashSet<String>>,
}

impl FailingStore {
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes_to(&self, key: &str) {
        self.failing_writes.lock().insert(key.to_string());
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("read refused"));
        }
        self.inner.get_string(key).await
    }

    async fn set_string(&self, key: &str, value: &str, options: &EntryOptions) -> Result<(), StoreError> {
        if self.failing_writes.lock().contains(key) {
            return Err(StoreError::unavailable(format!("write to {} refused", key)));
        }
        self.inner.set_string(key, value, options).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("remove refused"));
        }
        self.inner.remove(key).await
    }

    fn name(&self) -> &str {
        "failing"
    }
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

/// A captured log event.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: tracing::Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

/// Handle to the events captured by an [`EventCollector`].
#[derive(Debug, Clone, Default)]
pub struct Logs(Arc<Mutex<Vec<CapturedEvent>>>);

impl Logs {
    pub fn messages(&self) -> Vec<String> {
        self.0.lock().iter().map(|e| e.message.clone()).collect()
    }

    /// Number of messages that start with `prefix` and contain `infix`.
    pub fn count(&self, prefix: &str, infix: &str) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|e| e.message.starts_with(prefix) && e.message[prefix.len()..].contains(infix))
            .count()
    }

    pub fn hits(&self) -> usize {
        self.count("Cache hit, returning ", " for ")
    }

    pub fn misses(&self) -> usize {
        self.count("Cache miss, saving ", " to cache for ")
    }

    pub fn removals(&self) -> usize {
        self.count("Removing cache after getting ", "")
    }

    pub fn at_level(&self, level: tracing::Level) -> Vec<CapturedEvent> {
        self.0
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// A tracing layer that collects events for test assertions.
pub struct EventCollector {
    logs: Logs,
}

struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }
}

impl<S: Subscriber> Layer<S> for EventCollector {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor {
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut visitor);

        self.logs.0.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Captures events on the current thread until the guard is dropped.
pub fn capture_logs() -> (DefaultGuard, Logs) {
    let logs = Logs::default();
    let collector = EventCollector { logs: logs.clone() };
    let guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(collector));
    (guard, logs)
}
