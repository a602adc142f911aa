//! WorkResult — outcome of one Task.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exit-code sentinels for failures that did not come from a worker process.
pub mod exit_code {
    /// The worker exceeded its per-task timeout.
    pub const TIMEOUT: i32 = -1;
    /// The circuit breaker blocked the worker; nothing was invoked.
    pub const BREAKER_BLOCKED: i32 = -2;
    /// The pipeline-wide deadline abandoned the task.
    pub const DEADLINE_ABANDONED: i32 = -3;
    /// The invocation failed without a process exit code (panic, RPC error).
    pub const NON_PROCESS: i32 = -4;
}

/// Outcome of one Task.
///
/// Invariants:
/// - `success` implies `error` is empty
/// - `is_fallback` implies `original_worker_id` is set
///
/// Values are built with [`WorkResult::success`] / [`WorkResult::failure`]
/// and never mutated after being handed to a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkResult {
    /// Worker that produced this result (empty for the generic worker)
    pub worker_id: String,
    pub success: bool,
    /// Output text (empty on failure)
    pub output: String,
    /// Error text (empty on success)
    pub error: String,
    pub exit_code: i32,
    #[serde(with = "crate::core::serde_duration")]
    pub execution_time: Duration,
    /// True when the generic worker substituted for a blocked or failed named worker
    pub is_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_worker_id: Option<String>,
    /// Classified-failure label, e.g. "rate limit pattern detected"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,
}

impl WorkResult {
    /// Creates a successful result.
    pub fn success(worker_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            success: true,
            output: output.into(),
            error: String::new(),
            exit_code: 0,
            execution_time: Duration::ZERO,
            is_fallback: false,
            original_worker_id: None,
            termination_reason: None,
        }
    }

    /// Creates a failed result.
    pub fn failure(worker_id: impl Into<String>, error: impl Into<String>, exit_code: i32) -> Self {
        Self {
            worker_id: worker_id.into(),
            success: false,
            output: String::new(),
            error: error.into(),
            exit_code,
            execution_time: Duration::ZERO,
            is_fallback: false,
            original_worker_id: None,
            termination_reason: None,
        }
    }

    /// Failed result for a worker whose circuit breaker is open.
    pub fn breaker_blocked(worker_id: impl Into<String>) -> Self {
        let worker_id = worker_id.into();
        let error = format!("Circuit breaker open for {}", worker_id);
        Self::failure(worker_id, error, exit_code::BREAKER_BLOCKED)
    }

    /// Failed result for a task abandoned by the pipeline deadline.
    pub fn deadline_abandoned(worker_id: impl Into<String>, deadline: Duration) -> Self {
        Self::failure(
            worker_id,
            format!(
                "Pipeline deadline exceeded after {:.1}s",
                deadline.as_secs_f64()
            ),
            exit_code::DEADLINE_ABANDONED,
        )
        .with_termination_reason("pipeline deadline exceeded")
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_execution_time(mut self, execution_time: Duration) -> Self {
        self.execution_time = execution_time;
        self
    }

    pub fn with_termination_reason(mut self, reason: impl Into<String>) -> Self {
        self.termination_reason = Some(reason.into());
        self
    }

    /// Mark this result as produced by the generic worker on behalf of `original`.
    pub fn as_fallback_for(mut self, original: impl Into<String>) -> Self {
        let original = original.into();
        if !original.is_empty() {
            self.is_fallback = true;
            self.original_worker_id = Some(original);
        }
        self
    }

    /// Whether this result was blocked by a circuit breaker.
    pub fn is_breaker_blocked(&self) -> bool {
        !self.success && self.exit_code == exit_code::BREAKER_BLOCKED
    }

    /// Display label for the worker (`"generic"` for the fallback worker).
    pub fn worker_label(&self) -> &str {
        if self.worker_id.is_empty() {
            "generic"
        } else {
            &self.worker_id
        }
    }
}

/// Unique per-result labels: worker ids, suffixed `#n` when a worker repeats.
pub fn unique_labels(results: &[WorkResult]) -> Vec<String> {
    let mut seen: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    results
        .iter()
        .map(|r| {
            let label = r.worker_label();
            let n = seen.entry(label).or_insert(0);
            *n += 1;
            if *n == 1 {
                label.to_string()
            } else {
                format!("{}#{}", label, n)
            }
        })
        .collect()
}
