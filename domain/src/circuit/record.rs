//! Per-worker circuit state machine.
//!
//! ```text
//!   CLOSED ──(threshold failures in window)──▶ OPEN
//!     ▲                                          │ cooldown elapsed
//!     │ success                                  ▼
//!     └──────────────────────────────────── HALF_OPEN ──(probe fails)──▶ OPEN (cooldown x2)
//! ```
//!
//! [`BreakerRecord`] is pure: every method takes `now` explicitly so the
//! owner decides the clock. Serialization of concurrent access is the
//! owner's job.

use super::policy::{BreakerPolicy, WorkerKind};
use crate::work::FailureKind;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;

/// Upper bound on remembered failure timestamps per worker.
pub const MAX_FAILURE_HISTORY: usize = 16;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - requests allowed
    Closed,
    /// Fast-failing - requests rejected until cooldown elapses
    Open,
    /// One probe request allowed
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Read-only diagnostic snapshot of one breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub worker_id: String,
    /// Failures inside the active window
    pub recent_failures: usize,
    pub state: CircuitState,
    pub threshold: usize,
    pub is_adhoc: bool,
    /// Cooldown the next OPEN period lasts, in seconds
    pub cooldown_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<FailureKind>,
}

/// Per-worker circuit record.
#[derive(Debug, Clone)]
pub struct BreakerRecord {
    worker_id: String,
    kind: WorkerKind,
    failure_timestamps: VecDeque<Instant>,
    state: CircuitState,
    opened_at: Option<Instant>,
    probe_started_at: Option<Instant>,
    reopens: u32,
    last_failure: Option<FailureKind>,
}

impl BreakerRecord {
    pub fn new(worker_id: impl Into<String>, kind: WorkerKind) -> Self {
        Self {
            worker_id: worker_id.into(),
            kind,
            failure_timestamps: VecDeque::with_capacity(MAX_FAILURE_HISTORY),
            state: CircuitState::Closed,
            opened_at: None,
            probe_started_at: None,
            reopens: 0,
            last_failure: None,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    pub fn is_adhoc(&self) -> bool {
        self.kind == WorkerKind::AdHoc
    }

    pub fn policy(&self) -> BreakerPolicy {
        self.kind.policy()
    }

    /// Switch the policy class (e.g. when a worker is marked ad-hoc).
    pub fn set_kind(&mut self, kind: WorkerKind) {
        self.kind = kind;
    }

    /// Failures recorded within the active window ending at `now`.
    pub fn recent_failures(&self, now: Instant) -> usize {
        let window = self.policy().window;
        self.failure_timestamps
            .iter()
            .filter(|t| now.saturating_duration_since(**t) <= window)
            .count()
    }

    /// Current cooldown, including doubling for failed probes.
    pub fn cooldown(&self) -> std::time::Duration {
        self.policy().cooldown(self.reopens)
    }

    /// Record a failed attempt.
    ///
    /// Returns `true` when this failure transitioned the circuit to OPEN.
    pub fn record_failure(&mut self, now: Instant, kind: FailureKind) -> bool {
        if self.failure_timestamps.len() == MAX_FAILURE_HISTORY {
            self.failure_timestamps.pop_front();
        }
        self.failure_timestamps.push_back(now);
        self.last_failure = Some(kind);

        match self.state {
            CircuitState::HalfOpen => {
                self.reopens = self.reopens.saturating_add(1);
                self.open(now);
                true
            }
            CircuitState::Open => false,
            CircuitState::Closed => {
                if self.recent_failures(now) >= self.policy().failure_threshold {
                    self.open(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful attempt: clears history and closes the circuit.
    ///
    /// Returns `true` if the circuit was not already CLOSED.
    pub fn record_success(&mut self) -> bool {
        let was_closed = self.state == CircuitState::Closed;
        self.failure_timestamps.clear();
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.probe_started_at = None;
        self.reopens = 0;
        self.last_failure = None;
        !was_closed
    }

    /// Whether dispatch to this worker must be refused at `now`.
    ///
    /// An OPEN circuit whose cooldown has elapsed moves to HALF_OPEN and
    /// grants exactly one probe (returns `false` once). Further checks while
    /// the probe is outstanding return `true`, until either the probe
    /// reports back or another cooldown passes without a report.
    pub fn check_open(&mut self, now: Instant) -> bool {
        match self.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let opened_at = self.opened_at.unwrap_or(now);
                if now.saturating_duration_since(opened_at) >= self.cooldown() {
                    self.state = CircuitState::HalfOpen;
                    self.probe_started_at = Some(now);
                    false
                } else {
                    true
                }
            }
            CircuitState::HalfOpen => {
                let started = self.probe_started_at.unwrap_or(now);
                if now.saturating_duration_since(started) >= self.cooldown() {
                    // probe never reported back; grant another
                    self.probe_started_at = Some(now);
                    false
                } else {
                    true
                }
            }
        }
    }

    pub fn health(&self, now: Instant) -> HealthStatus {
        HealthStatus {
            worker_id: self.worker_id.clone(),
            recent_failures: self.recent_failures(now),
            state: self.state,
            threshold: self.policy().failure_threshold,
            is_adhoc: self.is_adhoc(),
            cooldown_secs: self.cooldown().as_secs(),
            last_failure: self.last_failure,
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.probe_started_at = None;
    }
}
