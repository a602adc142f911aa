//! Hand-written port mocks shared by the use case tests.

use crate::ports::{
    Clock, DispatchProgressNotifier, InvokeError, JitterSource, WorkerInvoker, WorkerOutput,
};
use async_trait::async_trait;
use ensemble_domain::WorkResult;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

// ==================== Clock ====================

/// Clock that only moves when told to; `sleep` records and advances.
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// Clock backed by tokio time, for tests on a paused runtime.
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ==================== Jitter ====================

pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn factor(&self, _spread: f64) -> f64 {
        self.0
    }
}

// ==================== Invoker ====================

#[derive(Clone)]
pub enum Outcome {
    Ok(String),
    Err(InvokeError),
    Panic,
}

/// One scripted invocation: wait `delay` (tokio time), then produce `outcome`.
#[derive(Clone)]
pub struct Step {
    pub delay: Duration,
    pub outcome: Outcome,
}

impl Step {
    pub fn ok(output: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Outcome::Ok(output.to_string()),
        }
    }

    pub fn err(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Outcome::Err(InvokeError::new(message).with_exit_code(1)),
        }
    }

    pub fn panic() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Outcome::Panic,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Invoker answering from per-worker scripts.
///
/// Each worker pops steps from its queue; once the queue is empty the
/// worker's `always` step repeats. Tracks call counts and the maximum
/// number of simultaneously active invocations.
#[derive(Default)]
pub struct ScriptedInvoker {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    always: Mutex<HashMap<String, Step>>,
    calls: Mutex<HashMap<String, usize>>,
    prompts: Mutex<Vec<(String, String)>>,
    active: AtomicUsize,
    high_water: AtomicUsize,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, worker_id: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(worker_id.to_string(), VecDeque::from(steps));
        self
    }

    pub fn always(self, worker_id: &str, step: Step) -> Self {
        self.always
            .lock()
            .unwrap()
            .insert(worker_id.to_string(), step);
        self
    }

    pub fn calls(&self, worker_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(worker_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_step(&self, worker_id: &str) -> Option<Step> {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(worker_id)
            .and_then(|q| q.pop_front());
        scripted.or_else(|| self.always.lock().unwrap().get(worker_id).cloned())
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorkerInvoker for ScriptedInvoker {
    async fn invoke(&self, worker_id: &str, prompt: &str) -> Result<WorkerOutput, InvokeError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(worker_id.to_string())
            .or_insert(0) += 1;
        self.prompts
            .lock()
            .unwrap()
            .push((worker_id.to_string(), prompt.to_string()));

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now_active, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        let step = self
            .next_step(worker_id)
            .ok_or_else(|| InvokeError::new(format!("Unknown worker: {}", worker_id)))?;
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        match step.outcome {
            Outcome::Ok(output) => Ok(WorkerOutput::new(output)),
            Outcome::Err(err) => Err(err),
            Outcome::Panic => panic!("scripted panic for {}", worker_id),
        }
    }
}

// ==================== Progress ====================

/// Records progress callbacks as strings.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl DispatchProgressNotifier for RecordingProgress {
    fn on_batch_start(&self, total: usize) {
        self.push(format!("batch_start:{total}"));
    }

    fn on_task_complete(&self, result: &WorkResult) {
        self.push(format!("complete:{}:{}", result.worker_label(), result.success));
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        self.push(format!("batch_complete:{succeeded}:{failed}"));
    }

    fn on_retry(&self, worker_id: &str, attempt: u32, _delay: Duration) {
        self.push(format!("retry:{worker_id}:{attempt}"));
    }

    fn on_breaker_blocked(&self, worker_id: &str) {
        self.push(format!("blocked:{worker_id}"));
    }

    fn on_fallback(&self, original_worker_id: &str) {
        self.push(format!("fallback:{original_worker_id}"));
    }
}
