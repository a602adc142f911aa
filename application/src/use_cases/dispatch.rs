//! Dispatcher use case
//!
//! Runs a batch of [`Task`]s against gated workers:
//!
//! 1. Each task checks the [`WorkerGate`] before every attempt; a blocked
//!    worker is skipped (or replaced by the generic worker when fallback is
//!    enabled).
//! 2. Attempts run under the task timeout. Failures are classified and
//!    retryable ones are retried with exponential backoff and jitter.
//! 3. Exhausted or non-retryable failures are recorded on the gate; with
//!    fallback enabled the generic worker gets one attempt.
//!
//! The batch runs under a concurrency bound (semaphore) and a pipeline
//! deadline. In first-success mode the batch returns on the first success
//! and the remaining tasks are cancelled cooperatively.

use crate::config::DispatchConfig;
use crate::ports::{
    Clock, DispatchProgressNotifier, InvokeError, JitterSource, NoJitter, NoProgress,
    WorkerInvoker, WorkerOutput,
};
use crate::worker_gate::{Admission, WorkerGate};
use ensemble_domain::{
    DispatchMode, DomainError, FailureKind, GENERIC_WORKER, Metadata, Task, WorkResult, exit_code,
};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors that can occur before a batch is dispatched
///
/// Worker failures are never errors; they are reported as failed
/// [`WorkResult`]s.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// A classified failure that cut a worker's attempt short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarlyTermination {
    pub worker_id: String,
    pub reason: String,
}

impl EarlyTermination {
    pub fn new(worker_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Task order for wait-for-all, completion order for first-success
    pub results: Vec<WorkResult>,
    /// Tasks refused by an open circuit without fallback
    pub circuit_blocked_count: usize,
    pub early_terminations: Vec<EarlyTermination>,
    /// Worker ids the generic worker substituted for
    pub fallback_agents: Vec<String>,
    pub deadline_exceeded: bool,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Pipeline bookkeeping as open metadata entries.
    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(
            "circuit_blocked_count".to_string(),
            self.circuit_blocked_count.into(),
        );
        metadata.insert(
            "early_terminations".to_string(),
            serde_json::to_value(&self.early_terminations).unwrap_or_default(),
        );
        metadata.insert(
            "fallback_agents".to_string(),
            serde_json::Value::from(self.fallback_agents.clone()),
        );
        metadata.insert(
            "deadline_exceeded".to_string(),
            self.deadline_exceeded.into(),
        );
        metadata
    }

    fn absorb(&mut self, outcome: TaskOutcome) {
        if outcome.blocked {
            self.circuit_blocked_count += 1;
        }
        if let Some(original) = &outcome.result.original_worker_id
            && !self.fallback_agents.contains(original)
        {
            self.fallback_agents.push(original.clone());
        }
        self.early_terminations.extend(outcome.early_terminations);
        self.results.push(outcome.result);
    }
}

/// Per-task result plus what the batch needs to know about it.
struct TaskOutcome {
    result: WorkResult,
    blocked: bool,
    early_terminations: Vec<EarlyTermination>,
}

impl TaskOutcome {
    fn completed(result: WorkResult) -> Self {
        Self {
            result,
            blocked: false,
            early_terminations: Vec::new(),
        }
    }

    /// A result produced outside `run_task` (panicked or abandoned task).
    fn terminated(result: WorkResult) -> Self {
        let early_terminations = termination_of(&result).into_iter().collect();
        Self {
            result,
            blocked: false,
            early_terminations,
        }
    }

    fn blocked(result: WorkResult) -> Self {
        Self {
            result,
            blocked: true,
            early_terminations: Vec::new(),
        }
    }

    fn with_early_terminations(mut self, early_terminations: Vec<EarlyTermination>) -> Self {
        self.early_terminations = early_terminations;
        self
    }
}

fn termination_of(result: &WorkResult) -> Option<EarlyTermination> {
    match (&result.termination_reason, result.success) {
        (Some(reason), false) => Some(EarlyTermination::new(&result.worker_id, reason)),
        _ => None,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Executes tasks against gated workers.
pub struct Dispatcher<I: WorkerInvoker + 'static> {
    invoker: Arc<I>,
    gate: Arc<WorkerGate>,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn JitterSource>,
    progress: Arc<dyn DispatchProgressNotifier>,
    config: DispatchConfig,
}

impl<I: WorkerInvoker + 'static> Clone for Dispatcher<I> {
    fn clone(&self) -> Self {
        Self {
            invoker: Arc::clone(&self.invoker),
            gate: Arc::clone(&self.gate),
            clock: Arc::clone(&self.clock),
            jitter: Arc::clone(&self.jitter),
            progress: Arc::clone(&self.progress),
            config: self.config.clone(),
        }
    }
}

impl<I: WorkerInvoker + 'static> Dispatcher<I> {
    pub fn new(invoker: Arc<I>, gate: Arc<WorkerGate>, clock: Arc<dyn Clock>) -> Self {
        Self {
            invoker,
            gate,
            clock,
            jitter: Arc::new(NoJitter),
            progress: Arc::new(NoProgress),
            config: DispatchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn DispatchProgressNotifier>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<WorkerGate> {
        &self.gate
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Run one task to completion (retries and fallback included).
    pub async fn dispatch_one(&self, task: Task) -> WorkResult {
        self.run_task(task).await.result
    }

    /// Run a batch under the concurrency bound and pipeline deadline.
    ///
    /// In [`DispatchMode::WaitForAll`] the report holds exactly one result per
    /// task, in task order; tasks still running at the deadline are reported
    /// as abandoned. In [`DispatchMode::FirstSuccess`] results are in
    /// completion order and stop at the first success.
    pub async fn dispatch_all(
        &self,
        tasks: Vec<Task>,
        mode: DispatchMode,
    ) -> Result<DispatchReport, DispatchError> {
        self.config.validate()?;

        let total = tasks.len();
        self.progress.on_batch_start(total);
        if tasks.is_empty() {
            self.progress.on_batch_complete(0, 0);
            return Ok(DispatchReport::default());
        }

        let longest = tasks
            .iter()
            .map(Task::timeout)
            .max()
            .unwrap_or(self.config.default_timeout);
        let deadline = self.config.deadline_for(longest);
        let worker_ids: Vec<String> = tasks.iter().map(|t| t.worker_id().to_string()).collect();

        info!(
            "Dispatching {} task(s) ({:?}, max {} concurrent, deadline {:.1}s)",
            total,
            mode,
            self.config.max_concurrent,
            deadline.as_secs_f64()
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let cancel = CancellationToken::new();
        let mut join_set = JoinSet::new();

        for (index, task) in tasks.into_iter().enumerate() {
            let this = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();

            join_set.spawn(async move {
                let run = async {
                    let _permit = semaphore.acquire_owned().await.ok()?;
                    let worker_id = task.worker_id().to_string();
                    match AssertUnwindSafe(this.run_task(task)).catch_unwind().await {
                        Ok(outcome) => Some(outcome),
                        Err(payload) => {
                            let message = panic_message(payload.as_ref());
                            error!("Dispatch task for {} panicked: {}", worker_id, message);
                            Some(TaskOutcome::terminated(WorkResult::failure(
                                worker_id,
                                format!("Dispatch task panicked: {}", message),
                                exit_code::NON_PROCESS,
                            )))
                        }
                    }
                };
                tokio::select! {
                    _ = cancel.cancelled() => (index, None),
                    outcome = run => (index, outcome),
                }
            });
        }

        let mut slots: Vec<Option<TaskOutcome>> = (0..total).map(|_| None).collect();
        let mut completion_order: Vec<usize> = Vec::with_capacity(total);
        let mut deadline_exceeded = false;

        let deadline_timer = tokio::time::sleep(deadline);
        tokio::pin!(deadline_timer);

        loop {
            tokio::select! {
                joined = join_set.join_next() => {
                    let Some(joined) = joined else { break };
                    let (index, outcome) = match joined {
                        Ok((index, Some(outcome))) => (index, outcome),
                        Ok((_, None)) => continue,
                        Err(err) => {
                            warn!("Dispatch task did not finish: {}", err);
                            continue;
                        }
                    };
                    self.progress.on_task_complete(&outcome.result);
                    let won = mode == DispatchMode::FirstSuccess && outcome.result.success;
                    completion_order.push(index);
                    slots[index] = Some(outcome);
                    if won {
                        debug!("First success from {}; cancelling remaining tasks", worker_ids[index]);
                        cancel.cancel();
                        join_set.detach_all();
                        break;
                    }
                }
                _ = &mut deadline_timer => {
                    deadline_exceeded = true;
                    warn!(
                        "Pipeline deadline of {:.1}s exceeded; abandoning {} pending task(s)",
                        deadline.as_secs_f64(),
                        join_set.len()
                    );
                    cancel.cancel();
                    join_set.detach_all();
                    break;
                }
            }
        }

        let mut report = DispatchReport {
            deadline_exceeded,
            ..Default::default()
        };
        let missing = |index: usize| {
            let worker_id = &worker_ids[index];
            TaskOutcome::terminated(if deadline_exceeded {
                WorkResult::deadline_abandoned(worker_id, deadline)
            } else {
                WorkResult::failure(
                    worker_id,
                    "Dispatch task did not report a result",
                    exit_code::NON_PROCESS,
                )
            })
        };

        match mode {
            DispatchMode::WaitForAll => {
                for (index, slot) in slots.iter_mut().enumerate() {
                    report.absorb(slot.take().unwrap_or_else(|| missing(index)));
                }
            }
            DispatchMode::FirstSuccess => {
                let mut reported = vec![false; total];
                for &index in &completion_order {
                    if let Some(outcome) = slots[index].take() {
                        reported[index] = true;
                        report.absorb(outcome);
                    }
                }
                if deadline_exceeded {
                    for index in (0..total).filter(|&i| !reported[i]) {
                        report.absorb(missing(index));
                    }
                }
            }
        }

        let (succeeded, failed) = (report.succeeded(), report.failed());
        info!(
            "Batch complete: {} succeeded, {} failed, {} blocked{}",
            succeeded,
            failed,
            report.circuit_blocked_count,
            if deadline_exceeded { ", deadline exceeded" } else { "" }
        );
        self.progress.on_batch_complete(succeeded, failed);

        Ok(report)
    }

    // ==================== Per-task Algorithm ====================

    async fn run_task(&self, task: Task) -> TaskOutcome {
        let worker_id = task.worker_id();
        self.progress.on_task_start(worker_id);

        let mut retries = 0u32;
        let mut early_terminations = Vec::new();
        loop {
            let admission = self.gate.admit(worker_id);
            if admission == Admission::Blocked {
                self.progress.on_breaker_blocked(worker_id);
                if self.config.fallback_to_llm {
                    info!("Circuit breaker open for {}; using generic worker", worker_id);
                    return self.fallback_outcome(&task, early_terminations).await;
                }
                warn!("Circuit breaker open for {}; task skipped", worker_id);
                return TaskOutcome::blocked(WorkResult::breaker_blocked(worker_id))
                    .with_early_terminations(early_terminations);
            }

            let started = self.clock.now();
            let outcome = self
                .invoke_once(worker_id, task.prompt(), task.timeout())
                .await;
            let elapsed = self.clock.now().saturating_duration_since(started);

            let err = match outcome {
                Ok(output) => {
                    self.gate.record_success(worker_id);
                    debug!("{} succeeded in {:.2}s", task_label(worker_id), elapsed.as_secs_f64());
                    return TaskOutcome::completed(success_result(worker_id, output, elapsed))
                        .with_early_terminations(early_terminations);
                }
                Err(err) => err,
            };

            let kind = FailureKind::classify(&err.message);
            if let Some(reason) = kind.termination_reason() {
                early_terminations.push(EarlyTermination::new(worker_id, reason));
            }

            // a failed half-open trial re-opens the circuit at once
            let trial = admission == Admission::Trial;
            if kind.is_retryable() && !trial && retries < self.config.max_retries {
                retries += 1;
                let delay = self.retry_delay(retries);
                info!(
                    "{} failed ({}); retry {}/{} in {:.2}s",
                    task_label(worker_id),
                    kind,
                    retries,
                    self.config.max_retries,
                    delay.as_secs_f64()
                );
                self.progress.on_retry(worker_id, retries, delay);
                self.clock.sleep(delay).await;
                continue;
            }

            if trial {
                warn!("{} half-open trial failed: {}", task_label(worker_id), err.message);
            } else if !kind.is_retryable() {
                warn!(
                    "{} failed with non-retryable {} error: {}",
                    task_label(worker_id),
                    kind,
                    err.message
                );
            } else {
                warn!(
                    "{} failed after {} attempt(s): {}",
                    task_label(worker_id),
                    retries + 1,
                    err.message
                );
            }

            self.gate.record_failure(worker_id, kind);
            if self.config.fallback_to_llm && !task.is_generic() {
                return self.fallback_outcome(&task, early_terminations).await;
            }
            return TaskOutcome::completed(failure_result(worker_id, &err, kind, elapsed))
                .with_early_terminations(early_terminations);
        }
    }

    async fn fallback_outcome(
        &self,
        task: &Task,
        mut early_terminations: Vec<EarlyTermination>,
    ) -> TaskOutcome {
        let result = self.run_fallback(task).await;
        early_terminations.extend(termination_of(&result));
        TaskOutcome::completed(result).with_early_terminations(early_terminations)
    }

    /// One attempt against the generic worker on behalf of `task`'s worker.
    async fn run_fallback(&self, task: &Task) -> WorkResult {
        let original = task.worker_id();
        self.progress.on_fallback(original);
        info!("Falling back to generic worker for {}", original);

        let started = self.clock.now();
        let outcome = self
            .invoke_once(GENERIC_WORKER, task.prompt(), task.timeout())
            .await;
        let elapsed = self.clock.now().saturating_duration_since(started);

        let result = match outcome {
            Ok(output) => success_result(GENERIC_WORKER, output, elapsed),
            Err(err) => {
                warn!("Fallback for {} failed: {}", original, err.message);
                let kind = FailureKind::classify(&err.message);
                failure_result(GENERIC_WORKER, &err, kind, elapsed)
            }
        };
        result.as_fallback_for(original)
    }

    /// Invoke once under `timeout`, converting panics into errors.
    async fn invoke_once(
        &self,
        worker_id: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<WorkerOutput, InvokeError> {
        let call = AssertUnwindSafe(self.invoker.invoke(worker_id, prompt)).catch_unwind();
        match tokio::time::timeout(timeout, call).await {
            Err(_) => Err(InvokeError::timed_out(timeout)),
            Ok(Err(payload)) => Err(InvokeError::new(format!(
                "Worker invocation panicked: {}",
                panic_message(payload.as_ref())
            ))),
            Ok(Ok(result)) => result,
        }
    }

    /// Backoff before retry `attempt`: base * 2^(attempt-1) * jitter.
    fn retry_delay(&self, attempt: u32) -> Duration {
        let base = self.config.backoff(attempt);
        let factor = self.jitter.factor(self.config.jitter_spread);
        let factor = if factor.is_finite() { factor.max(0.0) } else { 1.0 };
        Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(base)
    }
}

fn task_label(worker_id: &str) -> &str {
    if worker_id.is_empty() { "generic worker" } else { worker_id }
}

fn success_result(worker_id: &str, output: WorkerOutput, elapsed: Duration) -> WorkResult {
    WorkResult::success(worker_id, output.output)
        .with_exit_code(output.exit_code)
        .with_execution_time(elapsed)
}

fn failure_result(
    worker_id: &str,
    err: &InvokeError,
    kind: FailureKind,
    elapsed: Duration,
) -> WorkResult {
    let result = WorkResult::failure(
        worker_id,
        err.message.clone(),
        err.exit_code.unwrap_or(exit_code::NON_PROCESS),
    )
    .with_execution_time(elapsed);
    match kind.termination_reason() {
        Some(reason) => result.with_termination_reason(reason),
        None => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FixedJitter, ManualClock, RecordingProgress, ScriptedInvoker, Step, TokioClock,
    };
    use ensemble_domain::CircuitState;

    fn task(worker: &str) -> Task {
        Task::new(worker, "review this diff", Duration::from_secs(30)).unwrap()
    }

    fn build(
        invoker: ScriptedInvoker,
        config: DispatchConfig,
    ) -> (Arc<ScriptedInvoker>, Arc<ManualClock>, Dispatcher<ScriptedInvoker>) {
        let invoker = Arc::new(invoker);
        let clock = Arc::new(ManualClock::new());
        let gate = Arc::new(WorkerGate::new(clock.clone()));
        let dispatcher = Dispatcher::new(Arc::clone(&invoker), gate, clock.clone())
            .with_config(config)
            .with_jitter(Arc::new(FixedJitter(1.0)));
        (invoker, clock, dispatcher)
    }

    // ==================== Circuit Breaker ====================

    #[tokio::test]
    async fn test_blocked_worker_is_never_invoked() {
        let invoker = ScriptedInvoker::new()
            .always("codex", Step::ok("codex answer"))
            .always("claude", Step::ok("claude answer"));
        let (invoker, _, dispatcher) = build(invoker, DispatchConfig::default());
        for _ in 0..3 {
            dispatcher.gate().record_failure("codex", FailureKind::Other);
        }

        let report = dispatcher
            .dispatch_all(vec![task("codex"), task("claude")], DispatchMode::WaitForAll)
            .await
            .unwrap();

        assert_eq!(invoker.calls("codex"), 0);
        assert_eq!(invoker.calls("claude"), 1);
        assert_eq!(report.circuit_blocked_count, 1);
        assert_eq!(report.results[0].error, "Circuit breaker open for codex");
        assert!(report.results[0].is_breaker_blocked());
        assert!(report.results[1].success);
    }

    #[tokio::test]
    async fn test_repeated_failures_open_breaker() {
        let invoker = ScriptedInvoker::new().always("codex", Step::err("exit status 1"));
        let (invoker, _, dispatcher) =
            build(invoker, DispatchConfig::default().with_max_retries(0));

        for _ in 0..3 {
            let result = dispatcher.dispatch_one(task("codex")).await;
            assert!(!result.success);
        }
        assert!(dispatcher.gate().is_open("codex"));

        let result = dispatcher.dispatch_one(task("codex")).await;
        assert!(result.is_breaker_blocked());
        assert_eq!(invoker.calls("codex"), 3);
    }

    #[tokio::test]
    async fn test_success_closes_half_open_breaker() {
        let invoker = ScriptedInvoker::new().always("codex", Step::ok("recovered"));
        let (_, clock, dispatcher) = build(invoker, DispatchConfig::default());
        for _ in 0..3 {
            dispatcher.gate().record_failure("codex", FailureKind::ServerError);
        }
        clock.advance(Duration::from_secs(30));

        let result = dispatcher.dispatch_one(task("codex")).await;
        assert!(result.success);
        assert!(!dispatcher.gate().is_open("codex"));
    }

    #[tokio::test]
    async fn test_failed_half_open_attempt_reopens_with_longer_cooldown() {
        let invoker = ScriptedInvoker::new().always("codex", Step::err("503 Service Unavailable"));
        let (invoker, clock, dispatcher) = build(invoker, DispatchConfig::default());
        for _ in 0..3 {
            dispatcher.gate().record_failure("codex", FailureKind::ServerError);
        }
        clock.advance(Duration::from_secs(30));

        let report = dispatcher
            .dispatch_all(vec![task("codex")], DispatchMode::WaitForAll)
            .await
            .unwrap();

        // the half-open attempt is not retried
        assert_eq!(invoker.calls("codex"), 1);
        assert!(clock.sleeps().is_empty());
        let result = &report.results[0];
        assert!(!result.is_breaker_blocked());
        assert_eq!(result.error, "503 Service Unavailable");
        assert_eq!(report.circuit_blocked_count, 0);

        let health = dispatcher.gate().health_status("codex");
        assert_eq!(health.state, CircuitState::Open);
        assert_eq!(health.cooldown_secs, 60);

        clock.advance(Duration::from_secs(30));
        assert!(dispatcher.gate().is_open("codex"));
        clock.advance(Duration::from_secs(30));
        assert!(!dispatcher.gate().is_open("codex"));
    }

    #[tokio::test]
    async fn test_failed_half_open_attempt_falls_back() {
        let invoker = ScriptedInvoker::new()
            .always("codex", Step::err("503 Service Unavailable"))
            .always(GENERIC_WORKER, Step::ok("generic answer"));
        let (invoker, clock, dispatcher) =
            build(invoker, DispatchConfig::default().with_fallback(true));
        for _ in 0..3 {
            dispatcher.gate().record_failure("codex", FailureKind::ServerError);
        }
        clock.advance(Duration::from_secs(30));

        let result = dispatcher.dispatch_one(task("codex")).await;

        assert_eq!(invoker.calls("codex"), 1);
        assert!(result.success);
        assert!(result.is_fallback);
        assert_eq!(
            dispatcher.gate().health_status("codex").state,
            CircuitState::Open
        );
    }

    // ==================== Retry ====================

    #[tokio::test]
    async fn test_backoff_doubles_between_retries() {
        let invoker = ScriptedInvoker::new().script(
            "gemini",
            vec![
                Step::err("503 Service Unavailable"),
                Step::err("503 Service Unavailable"),
                Step::ok("finally"),
            ],
        );
        let (invoker, clock, dispatcher) =
            build(invoker, DispatchConfig::default().with_max_retries(3));

        let result = dispatcher.dispatch_one(task("gemini")).await;

        assert!(result.success);
        assert_eq!(result.output, "finally");
        assert_eq!(invoker.calls("gemini"), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn test_backoff_applies_jitter() {
        let invoker = ScriptedInvoker::new().always("gemini", Step::err("rate limit exceeded"));
        let invoker = Arc::new(invoker);
        let clock = Arc::new(ManualClock::new());
        let gate = Arc::new(WorkerGate::new(clock.clone()));
        let dispatcher = Dispatcher::new(invoker, gate, clock.clone())
            .with_config(DispatchConfig::default().with_max_retries(2))
            .with_jitter(Arc::new(FixedJitter(1.1)));

        dispatcher.dispatch_one(task("gemini")).await;

        let sleeps = clock.sleeps();
        assert_eq!(sleeps.len(), 2);
        assert!((sleeps[0].as_secs_f64() - 1.1).abs() < 1e-9);
        assert!((sleeps[1].as_secs_f64() - 2.2).abs() < 1e-9);
        assert!(sleeps[1] > sleeps[0]);
    }

    #[tokio::test]
    async fn test_retries_exhausted_reports_early_termination() {
        let invoker = ScriptedInvoker::new().always("gemini", Step::err("429 Too Many Requests"));
        let (invoker, _, dispatcher) = build(invoker, DispatchConfig::default());

        let report = dispatcher
            .dispatch_all(vec![task("gemini")], DispatchMode::WaitForAll)
            .await
            .unwrap();

        assert_eq!(invoker.calls("gemini"), 3);
        let result = &report.results[0];
        assert!(!result.success);
        assert_eq!(
            result.termination_reason.as_deref(),
            Some("rate limit pattern detected")
        );
        assert_eq!(
            report.early_terminations,
            vec![EarlyTermination::new("gemini", "rate limit pattern detected"); 3]
        );
        assert_eq!(
            dispatcher.gate().health_status("gemini").recent_failures,
            1
        );
    }

    #[tokio::test]
    async fn test_recovered_attempt_still_reports_early_termination() {
        let invoker = ScriptedInvoker::new().script(
            "gemini",
            vec![Step::err("429 Too Many Requests"), Step::ok("ok")],
        );
        let (invoker, _, dispatcher) = build(invoker, DispatchConfig::default());

        let report = dispatcher
            .dispatch_all(vec![task("gemini")], DispatchMode::WaitForAll)
            .await
            .unwrap();

        assert_eq!(invoker.calls("gemini"), 2);
        assert!(report.results[0].success);
        assert_eq!(
            report.early_terminations,
            vec![EarlyTermination::new("gemini", "rate limit pattern detected")]
        );
    }

    #[tokio::test]
    async fn test_authentication_failure_is_not_retried() {
        let invoker = ScriptedInvoker::new().always("claude", Step::err("401 Unauthorized"));
        let (invoker, clock, dispatcher) = build(invoker, DispatchConfig::default());

        let result = dispatcher.dispatch_one(task("claude")).await;

        assert_eq!(invoker.calls("claude"), 1);
        assert!(clock.sleeps().is_empty());
        assert_eq!(
            result.termination_reason.as_deref(),
            Some("authentication failure detected")
        );
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_timeout_is_retryable_failure() {
        let invoker =
            ScriptedInvoker::new().always("slow", Step::ok("too late").after(Duration::from_secs(10)));
        let (invoker, _, dispatcher) =
            build(invoker, DispatchConfig::default().with_max_retries(1));
        let task = Task::new("slow", "prompt", Duration::from_secs(1)).unwrap();

        let result = dispatcher.dispatch_one(task).await;

        assert!(!result.success);
        assert_eq!(invoker.calls("slow"), 2);
        assert_eq!(result.exit_code, exit_code::TIMEOUT);
        assert_eq!(
            result.termination_reason.as_deref(),
            Some("timeout pattern detected")
        );
    }

    #[tokio::test]
    async fn test_invoker_panic_becomes_failed_result() {
        let invoker = ScriptedInvoker::new()
            .always("broken", Step::panic())
            .always("ok", Step::ok("fine"));
        let (_, _, dispatcher) = build(invoker, DispatchConfig::default().with_max_retries(0));

        let report = dispatcher
            .dispatch_all(vec![task("broken"), task("ok")], DispatchMode::WaitForAll)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 2);
        assert!(!report.results[0].success);
        assert!(report.results[0].error.contains("panicked"));
        assert_eq!(report.results[0].exit_code, exit_code::NON_PROCESS);
        assert!(report.results[1].success);
    }

    // ==================== Fallback ====================

    #[tokio::test]
    async fn test_fallback_replaces_blocked_worker() {
        let invoker = ScriptedInvoker::new().always(GENERIC_WORKER, Step::ok("generic answer"));
        let (invoker, _, dispatcher) =
            build(invoker, DispatchConfig::default().with_fallback(true));
        for _ in 0..3 {
            dispatcher.gate().record_failure("codex", FailureKind::Other);
        }

        let report = dispatcher
            .dispatch_all(vec![task("codex")], DispatchMode::WaitForAll)
            .await
            .unwrap();

        let result = &report.results[0];
        assert!(result.success);
        assert!(result.is_fallback);
        assert_eq!(result.original_worker_id.as_deref(), Some("codex"));
        assert_eq!(invoker.calls("codex"), 0);
        assert_eq!(report.fallback_agents, vec!["codex".to_string()]);
        assert_eq!(report.circuit_blocked_count, 0);
    }

    #[tokio::test]
    async fn test_fallback_after_exhausted_retries() {
        let invoker = ScriptedInvoker::new()
            .always("codex", Step::err("exit status 2"))
            .always(GENERIC_WORKER, Step::ok("generic answer"));
        let (invoker, _, dispatcher) = build(
            invoker,
            DispatchConfig::default()
                .with_max_retries(1)
                .with_fallback(true),
        );

        let result = dispatcher.dispatch_one(task("codex")).await;

        assert_eq!(invoker.calls("codex"), 2);
        assert_eq!(invoker.calls(GENERIC_WORKER), 1);
        assert!(result.success);
        assert!(result.is_fallback);
        assert_eq!(result.worker_id, GENERIC_WORKER);
    }

    // ==================== Batch Scheduling ====================

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bound() {
        let mut invoker = ScriptedInvoker::new();
        for i in 0..6 {
            invoker = invoker.always(
                &format!("w{i}"),
                Step::ok("done").after(Duration::from_millis(100)),
            );
        }
        let (invoker, _, dispatcher) =
            build(invoker, DispatchConfig::default().with_max_concurrent(2));
        let tasks = (0..6).map(|i| task(&format!("w{i}"))).collect();

        let report = dispatcher
            .dispatch_all(tasks, DispatchMode::WaitForAll)
            .await
            .unwrap();

        assert_eq!(report.succeeded(), 6);
        assert_eq!(invoker.total_calls(), 6);
        assert_eq!(invoker.high_water(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_all_preserves_task_order() {
        let invoker = ScriptedInvoker::new()
            .always("a", Step::ok("from a").after(Duration::from_millis(50)))
            .always("b", Step::ok("from b").after(Duration::from_millis(10)))
            .always("c", Step::err("exit status 1"));
        let (_, _, dispatcher) = build(invoker, DispatchConfig::default().with_max_retries(0));

        let report = dispatcher
            .dispatch_all(vec![task("a"), task("b"), task("c")], DispatchMode::WaitForAll)
            .await
            .unwrap();

        let ids: Vec<&str> = report.results.iter().map(|r| r.worker_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(report.succeeded(), 2);
        assert!(!report.deadline_exceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_returns_fastest() {
        let invoker = ScriptedInvoker::new()
            .always("a", Step::ok("from a").after(Duration::from_millis(10)))
            .always("b", Step::ok("from b").after(Duration::from_millis(100)));
        let (_, _, dispatcher) = build(invoker, DispatchConfig::default());

        let report = dispatcher
            .dispatch_all(vec![task("b"), task("a")], DispatchMode::FirstSuccess)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].worker_id, "a");
        assert_eq!(report.results[0].output, "from a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_skips_failures() {
        let invoker = ScriptedInvoker::new()
            .always("bad", Step::err("401 Unauthorized"))
            .always("good", Step::ok("ok").after(Duration::from_millis(50)));
        let (_, _, dispatcher) = build(invoker, DispatchConfig::default());

        let report = dispatcher
            .dispatch_all(vec![task("bad"), task("good")], DispatchMode::FirstSuccess)
            .await
            .unwrap();

        let ids: Vec<&str> = report.results.iter().map(|r| r.worker_id.as_str()).collect();
        assert_eq!(ids, vec!["bad", "good"]);
        assert!(report.results[1].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipeline_deadline_abandons_pending_tasks() {
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .always("fast", Step::ok("quick"))
                .always(
                    "slow",
                    Step::err("503 Service Unavailable").after(Duration::from_secs(8)),
                ),
        );
        let gate = Arc::new(WorkerGate::new(Arc::new(TokioClock)));
        let dispatcher = Dispatcher::new(invoker, gate, Arc::new(TokioClock))
            .with_config(DispatchConfig::default());
        let tasks = vec![
            Task::new("fast", "p", Duration::from_secs(10)).unwrap(),
            Task::new("slow", "p", Duration::from_secs(10)).unwrap(),
        ];

        // slow: 8s attempt + 1s backoff + 8s attempt > 15s deadline
        let report = dispatcher
            .dispatch_all(tasks, DispatchMode::WaitForAll)
            .await
            .unwrap();

        assert!(report.deadline_exceeded);
        assert_eq!(report.results.len(), 2);
        assert!(report.results[0].success);
        let abandoned = &report.results[1];
        assert_eq!(abandoned.worker_id, "slow");
        assert_eq!(abandoned.exit_code, exit_code::DEADLINE_ABANDONED);
        assert!(
            report
                .early_terminations
                .iter()
                .any(|t| t.reason == "pipeline deadline exceeded")
        );
    }

    #[tokio::test]
    async fn test_progress_callbacks() {
        let invoker = ScriptedInvoker::new()
            .script("a", vec![Step::err("502 Bad Gateway"), Step::ok("ok")]);
        let progress = Arc::new(RecordingProgress::default());
        let (_, _, dispatcher) = build(invoker, DispatchConfig::default());
        let dispatcher = dispatcher.with_progress(progress.clone());

        dispatcher
            .dispatch_all(vec![task("a")], DispatchMode::WaitForAll)
            .await
            .unwrap();

        assert_eq!(
            progress.events(),
            vec![
                "batch_start:1",
                "retry:a:1",
                "complete:a:true",
                "batch_complete:1:0"
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (_, _, dispatcher) = build(ScriptedInvoker::new(), DispatchConfig::default());
        let report = dispatcher
            .dispatch_all(Vec::new(), DispatchMode::WaitForAll)
            .await
            .unwrap();
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_is_an_error() {
        let (_, _, dispatcher) = build(
            ScriptedInvoker::new(),
            DispatchConfig::default().with_max_concurrent(0),
        );
        let result = dispatcher
            .dispatch_all(vec![task("a")], DispatchMode::WaitForAll)
            .await;
        assert!(matches!(
            result,
            Err(DispatchError::Domain(DomainError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_report_metadata() {
        let report = DispatchReport {
            circuit_blocked_count: 2,
            fallback_agents: vec!["codex".to_string()],
            early_terminations: vec![EarlyTermination::new("gemini", "timeout pattern detected")],
            ..Default::default()
        };
        let metadata = report.metadata();
        assert_eq!(metadata["circuit_blocked_count"], 2);
        assert_eq!(metadata["fallback_agents"][0], "codex");
        assert_eq!(metadata["early_terminations"][0]["reason"], "timeout pattern detected");
        assert_eq!(metadata["deadline_exceeded"], false);
    }
}
