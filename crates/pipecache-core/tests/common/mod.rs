#![allow(dead_code)]
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pipecache_core::{CancellationToken, DispatchError, Next, PipelineBehavior, Request, RequestHandler};
use tokio::sync::Mutex;

/// Request que suma uno.
#[derive(Debug, Clone)]
pub struct Increment(pub u64);

impl Request for Increment {
    type Response = u64;
}

/// Request con el mismo tipo de respuesta que `Increment`.
#[derive(Debug, Clone)]
pub struct Double(pub u64);

impl Request for Double {
    type Response = u64;
}

pub struct IncrementHandler;

#[async_trait]
impl RequestHandler<Increment> for IncrementHandler {
    async fn handle(&self, request: &Increment, _: &CancellationToken) -> Result<u64, DispatchError> {
        Ok(request.0 + 1)
    }
}

pub struct DoubleHandler;

#[async_trait]
impl RequestHandler<Double> for DoubleHandler {
    async fn handle(&self, request: &Double, _: &CancellationToken) -> Result<u64, DispatchError> {
        Ok(request.0 * 2)
    }
}

/// Behavior generico que registra el orden de entrada y salida.
#[derive(Clone)]
pub struct Trace {
    pub label: &'static str,
    pub journal: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl<R: Request> PipelineBehavior<R> for Trace {
    async fn handle(
        &self,
        _request: &R,
        next: Next<'_, R>,
        _cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        self.journal.lock().await.push(format!("enter {}", self.label));
        let result = next.run().await;
        self.journal.lock().await.push(format!("leave {}", self.label));
        result
    }
}

/// Behavior que cuenta invocaciones.
#[derive(Clone, Default)]
pub struct Counter(pub Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: Request> PipelineBehavior<R> for Counter {
    async fn handle(
        &self,
        _request: &R,
        next: Next<'_, R>,
        _cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        next.run().await
    }
}
