//! In-process workers
//!
//! Workers backed by async closures. Used for specialist agents spawned
//! inside the process and for wiring demos without external CLIs.

use async_trait::async_trait;
use ensemble_application::{InvokeError, WorkerInvoker, WorkerOutput};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

type Handler =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<WorkerOutput, InvokeError>> + Send + Sync>;

/// Invoker dispatching to registered closures by worker id.
#[derive(Default, Clone)]
pub struct InProcessInvoker {
    handlers: HashMap<String, Handler>,
}

impl InProcessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `worker_id`; the closure receives the prompt.
    ///
    /// Registering `""` provides the generic fallback worker.
    pub fn register<F, Fut>(mut self, worker_id: impl Into<String>, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<WorkerOutput, InvokeError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |prompt| Box::pin(handler(prompt)));
        self.handlers.insert(worker_id.into(), handler);
        self
    }

    pub fn contains(&self, worker_id: &str) -> bool {
        self.handlers.contains_key(worker_id)
    }

    pub fn worker_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl WorkerInvoker for InProcessInvoker {
    async fn invoke(&self, worker_id: &str, prompt: &str) -> Result<WorkerOutput, InvokeError> {
        let handler = self
            .handlers
            .get(worker_id)
            .cloned()
            .ok_or_else(|| InvokeError::new(format!("Unknown worker: {}", worker_id)))?;
        handler(prompt.to_string()).await
    }
}
