//! Worker gate: the shared circuit-breaker registry.
//!
//! One [`BreakerRecord`] per worker id, each behind its own mutex so that
//! concurrent tasks for the same worker update failure counts and state
//! atomically while tasks for different workers never contend. Locks are
//! never held across an `.await`.
//!
//! Workers the gate has never seen are treated as CLOSED standard workers.
//! The generic fallback worker (`""`) is never gated.

use crate::ports::Clock;
use ensemble_domain::{
    BreakerRecord, CircuitState, FailureKind, GENERIC_WORKER, HealthStatus, WorkerKind,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

type SharedRecord = Arc<Mutex<BreakerRecord>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Gate decision for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// The one attempt a HALF_OPEN circuit lets through
    Trial,
    Blocked,
}

/// Thread-safe per-worker circuit breaker registry.
pub struct WorkerGate {
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<String, SharedRecord>>,
}

impl WorkerGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn existing(&self, worker_id: &str) -> Option<SharedRecord> {
        lock(&self.records).get(worker_id).cloned()
    }

    fn record(&self, worker_id: &str) -> SharedRecord {
        let mut records = lock(&self.records);
        Arc::clone(records.entry(worker_id.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(BreakerRecord::new(
                worker_id,
                WorkerKind::Standard,
            )))
        }))
    }

    /// Whether dispatch to `worker_id` must be refused right now.
    ///
    /// May move an OPEN circuit to HALF_OPEN once its cooldown elapsed, in
    /// which case exactly one probe is let through.
    pub fn is_open(&self, worker_id: &str) -> bool {
        self.admit(worker_id) == Admission::Blocked
    }

    /// Decide whether one attempt on `worker_id` may run, and whether it is
    /// the single HALF_OPEN trial.
    pub fn admit(&self, worker_id: &str) -> Admission {
        if worker_id == GENERIC_WORKER {
            return Admission::Allowed;
        }
        let Some(record) = self.existing(worker_id) else {
            return Admission::Allowed;
        };
        let now = self.clock.now();
        let mut record = lock(&record);
        let before = record.state();
        if record.check_open(now) {
            return Admission::Blocked;
        }
        match record.state() {
            CircuitState::HalfOpen => {
                if before == CircuitState::Open {
                    info!(
                        "Circuit for {} is HALF_OPEN after {:.0}s cooldown; allowing one probe",
                        worker_id,
                        record.cooldown().as_secs_f64()
                    );
                }
                Admission::Trial
            }
            _ => Admission::Allowed,
        }
    }

    /// Record a failed attempt (after retries were exhausted or skipped).
    pub fn record_failure(&self, worker_id: &str, kind: FailureKind) {
        if worker_id == GENERIC_WORKER {
            return;
        }
        let record = self.record(worker_id);
        let now = self.clock.now();
        let mut record = lock(&record);
        let from_half_open = record.state() == CircuitState::HalfOpen;
        if record.record_failure(now, kind) {
            if from_half_open {
                warn!(
                    "Probe for {} failed ({}); circuit OPEN again for {:.0}s",
                    worker_id,
                    kind,
                    record.cooldown().as_secs_f64()
                );
            } else {
                warn!(
                    "Circuit for {} OPEN after {} failures (last: {})",
                    worker_id,
                    record.recent_failures(now),
                    kind
                );
            }
        } else {
            debug!(
                "Recorded {} failure for {} ({}/{} in window)",
                kind,
                worker_id,
                record.recent_failures(now),
                record.policy().failure_threshold
            );
        }
    }

    /// Record a successful attempt; closes the circuit.
    pub fn record_success(&self, worker_id: &str) {
        if worker_id == GENERIC_WORKER {
            return;
        }
        let Some(record) = self.existing(worker_id) else {
            return;
        };
        if lock(&record).record_success() {
            info!("Circuit for {} CLOSED after successful probe", worker_id);
        }
    }

    /// Switch `worker_id` to the ad-hoc policy (higher threshold, longer window).
    pub fn mark_as_adhoc(&self, worker_id: &str) {
        if worker_id == GENERIC_WORKER {
            return;
        }
        let record = self.record(worker_id);
        let mut record = lock(&record);
        if !record.is_adhoc() {
            debug!("Marking {} as ad-hoc worker", worker_id);
            record.set_kind(WorkerKind::AdHoc);
        }
    }

    /// Diagnostic snapshot for one worker.
    pub fn health_status(&self, worker_id: &str) -> HealthStatus {
        let now = self.clock.now();
        match self.existing(worker_id) {
            Some(record) => lock(&record).health(now),
            None => BreakerRecord::new(worker_id, WorkerKind::Standard).health(now),
        }
    }

    /// Snapshots for every known worker, sorted by id.
    pub fn all_health(&self) -> Vec<HealthStatus> {
        let now = self.clock.now();
        let records: Vec<SharedRecord> = lock(&self.records).values().cloned().collect();
        let mut statuses: Vec<HealthStatus> =
            records.iter().map(|r| lock(r).health(now)).collect();
        statuses.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
        statuses
    }

    /// Forget every record.
    pub fn reset_all(&self) {
        let mut records = lock(&self.records);
        if !records.is_empty() {
            info!("Resetting {} circuit breaker(s)", records.len());
        }
        records.clear();
    }
}
