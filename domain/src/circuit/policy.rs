//! Circuit breaker policies.
//!
//! Policies are selected per worker by [`WorkerKind`] at registration time:
//!
//! | | standard | ad-hoc |
//! |---|---|---|
//! | failures to open | 3 | 4 |
//! | fast-fail window | 10 s | 30 s |
//! | base cooldown | 30 s | 30 s |
//!
//! The cooldown doubles every time a half-open probe fails, capped at
//! `max_cooldown_multiplier` times the base.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds and timings of one circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerPolicy {
    /// Failures within `window` that open the circuit
    pub failure_threshold: usize,
    /// Span over which failures are counted
    pub window: Duration,
    /// Time the circuit stays open before a half-open probe is allowed
    pub base_cooldown: Duration,
    pub max_cooldown_multiplier: u32,
}

impl BreakerPolicy {
    pub const STANDARD: BreakerPolicy = BreakerPolicy {
        failure_threshold: 3,
        window: Duration::from_secs(10),
        base_cooldown: Duration::from_secs(30),
        max_cooldown_multiplier: 8,
    };

    pub const ADHOC: BreakerPolicy = BreakerPolicy {
        failure_threshold: 4,
        window: Duration::from_secs(30),
        base_cooldown: Duration::from_secs(30),
        max_cooldown_multiplier: 8,
    };

    /// Cooldown after `reopens` failed probes.
    pub fn cooldown(&self, reopens: u32) -> Duration {
        let multiplier = 2u32
            .saturating_pow(reopens)
            .min(self.max_cooldown_multiplier.max(1));
        self.base_cooldown.saturating_mul(multiplier)
    }
}

/// Worker lifetime class, which selects the breaker policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    /// Long-lived named tool
    #[default]
    Standard,
    /// Spawned for one specific task
    AdHoc,
}

impl WorkerKind {
    pub fn policy(&self) -> BreakerPolicy {
        match self {
            WorkerKind::Standard => BreakerPolicy::STANDARD,
            WorkerKind::AdHoc => BreakerPolicy::ADHOC,
        }
    }
}
