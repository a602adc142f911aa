//! Dispatch parameters: concurrency, retries, fallback and deadlines.

use ensemble_domain::DomainError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dispatcher control parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum number of workers running at once
    pub max_concurrent: usize,
    /// Retries after the first attempt for retryable failures
    pub max_retries: u32,
    /// Delay before the first retry; doubles per attempt
    pub base_retry_delay: Duration,
    /// Spread of the multiplicative backoff jitter (0.1 = ±10%)
    pub jitter_spread: f64,
    /// Substitute the generic worker for blocked or exhausted workers
    pub fallback_to_llm: bool,
    /// Pipeline deadline = longest task timeout × this multiplier
    pub deadline_multiplier: f64,
    /// Timeout for tasks built without an explicit one
    pub default_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            max_retries: 2,
            base_retry_delay: Duration::from_secs(1),
            jitter_spread: 0.1,
            fallback_to_llm: false,
            deadline_multiplier: 1.5,
            default_timeout: Duration::from_secs(120),
        }
    }
}

impl DispatchConfig {
    // ==================== Builder Methods ====================

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_base_retry_delay(mut self, delay: Duration) -> Self {
        self.base_retry_delay = delay;
        self
    }

    pub fn with_jitter_spread(mut self, spread: f64) -> Self {
        self.jitter_spread = spread;
        self
    }

    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_to_llm = enabled;
        self
    }

    pub fn with_deadline_multiplier(mut self, multiplier: f64) -> Self {
        self.deadline_multiplier = multiplier;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    // ==================== Derived Values ====================

    /// Backoff before retry `attempt` (1-based), before jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_retry_delay.saturating_mul(1u32 << exponent)
    }

    /// Pipeline deadline for a batch whose longest task timeout is `longest`.
    pub fn deadline_for(&self, longest: Duration) -> Duration {
        Duration::try_from_secs_f64(longest.as_secs_f64() * self.deadline_multiplier)
            .unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_concurrent == 0 {
            return Err(DomainError::InvalidConfig(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if !self.deadline_multiplier.is_finite() || self.deadline_multiplier < 1.0 {
            return Err(DomainError::InvalidConfig(format!(
                "deadline_multiplier must be a finite value >= 1.0, got {}",
                self.deadline_multiplier
            )));
        }
        if !(0.0..1.0).contains(&self.jitter_spread) {
            return Err(DomainError::InvalidConfig(format!(
                "jitter_spread must be in [0, 1), got {}",
                self.jitter_spread
            )));
        }
        if self.default_timeout.is_zero() {
            return Err(DomainError::InvalidConfig(
                "default_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
