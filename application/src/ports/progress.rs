//! Dispatch progress port
//!
//! Reports what the dispatcher is doing while a batch runs.

use ensemble_domain::WorkResult;
use std::time::Duration;

/// Callback for progress updates during dispatch
///
/// Implementations live in outer layers (tracing, console, ...).
pub trait DispatchProgressNotifier: Send + Sync {
    /// Called once before any task of a batch starts
    fn on_batch_start(&self, total: usize);

    /// Called when a task has produced its final result
    fn on_task_complete(&self, result: &WorkResult);

    /// Called once after the batch has been collected
    fn on_batch_complete(&self, succeeded: usize, failed: usize);

    // ==================== Optional Callbacks ====================

    fn on_task_start(&self, _worker_id: &str) {}

    /// Called before sleeping ahead of retry `attempt` (1-based)
    fn on_retry(&self, _worker_id: &str, _attempt: u32, _delay: Duration) {}

    fn on_breaker_blocked(&self, _worker_id: &str) {}

    /// Called when the generic worker substitutes for `original_worker_id`
    fn on_fallback(&self, _original_worker_id: &str) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl DispatchProgressNotifier for NoProgress {
    fn on_batch_start(&self, _total: usize) {}
    fn on_task_complete(&self, _result: &WorkResult) {}
    fn on_batch_complete(&self, _succeeded: usize, _failed: usize) {}
}
