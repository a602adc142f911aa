//! Progress notifier that reports through `tracing`.

use ensemble_application::DispatchProgressNotifier;
use ensemble_domain::WorkResult;
use ensemble_domain::core::string::preview;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl DispatchProgressNotifier for TracingProgress {
    fn on_batch_start(&self, total: usize) {
        info!("Dispatching {} task(s)", total);
    }

    fn on_task_start(&self, worker_id: &str) {
        debug!("Task started on {}", label(worker_id));
    }

    fn on_task_complete(&self, result: &WorkResult) {
        if result.success {
            info!(
                "{} finished in {:.1}s",
                result.worker_label(),
                result.execution_time.as_secs_f64()
            );
        } else {
            warn!(
                "{} failed (exit {}): {}",
                result.worker_label(),
                result.exit_code,
                preview(&result.error, 200)
            );
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        info!("Batch complete: {} succeeded, {} failed", succeeded, failed);
    }

    fn on_retry(&self, worker_id: &str, attempt: u32, delay: Duration) {
        info!(
            "Retrying {} (attempt {}) in {:.2}s",
            label(worker_id),
            attempt,
            delay.as_secs_f64()
        );
    }

    fn on_breaker_blocked(&self, worker_id: &str) {
        warn!("{} skipped: circuit open", label(worker_id));
    }

    fn on_fallback(&self, original_worker_id: &str) {
        info!("Falling back to generic worker for {}", original_worker_id);
    }
}

fn label(worker_id: &str) -> &str {
    if worker_id.is_empty() {
        "generic worker"
    } else {
        worker_id
    }
}
