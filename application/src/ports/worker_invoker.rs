//! Worker invoker port
//!
//! Defines how the dispatcher reaches one worker. Adapters (subprocess CLI
//! tools, in-process agents) live in the infrastructure layer.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Successful worker output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutput {
    pub output: String,
    pub exit_code: i32,
}

impl WorkerOutput {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit_code: 0,
        }
    }
}

/// Failed worker invocation.
///
/// `exit_code` is `None` when the failure did not come from a process exit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct InvokeError {
    pub message: String,
    pub exit_code: Option<i32>,
}

impl InvokeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            exit_code: None,
        }
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    /// Error for an invocation that exceeded its per-task timeout.
    pub fn timed_out(timeout: Duration) -> Self {
        Self::new(format!(
            "Worker timed out after {:.1}s",
            timeout.as_secs_f64()
        ))
        .with_exit_code(ensemble_domain::exit_code::TIMEOUT)
    }
}

/// Invokes one worker with one prompt.
///
/// `worker_id == ""` addresses the generic fallback worker.
#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    async fn invoke(&self, worker_id: &str, prompt: &str) -> Result<WorkerOutput, InvokeError>;
}
