//! Task — one worker invocation request.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker id denoting the generic fallback worker.
pub const GENERIC_WORKER: &str = "";

/// One worker invocation request.
///
/// Tasks are immutable once built. An empty `worker_id` addresses the
/// generic fallback worker.
///
/// # Example
///
/// ```
/// use ensemble_domain::Task;
/// use std::time::Duration;
///
/// let task = Task::new("claude", "Explain the borrow checker", Duration::from_secs(60))
///     .unwrap()
///     .with_weight(2.0);
/// assert_eq!(task.worker_id(), "claude");
/// assert_eq!(task.weight(), 2.0);
/// assert!(!task.is_generic());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    worker_id: String,
    prompt: String,
    #[serde(with = "crate::core::serde_duration")]
    timeout: Duration,
    weight: f64,
}

impl Task {
    /// Build a task, validating the prompt and timeout.
    pub fn new(
        worker_id: impl Into<String>,
        prompt: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(DomainError::InvalidTask("prompt must not be empty".into()));
        }
        if timeout.is_zero() {
            return Err(DomainError::InvalidTask("timeout must be > 0".into()));
        }
        Ok(Self {
            worker_id: worker_id.into(),
            prompt,
            timeout,
            weight: 1.0,
        })
    }

    /// Build a task addressed to the generic fallback worker.
    pub fn generic(prompt: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        Self::new(GENERIC_WORKER, prompt, timeout)
    }

    /// Set the relative importance used by score- and vote-based aggregation.
    ///
    /// Non-finite or negative weights are clamped to 0.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Whether this task targets the generic fallback worker.
    pub fn is_generic(&self) -> bool {
        self.worker_id.is_empty()
    }
}
