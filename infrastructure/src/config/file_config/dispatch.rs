//! Dispatch configuration from TOML (`[dispatch]` section)

use ensemble_application::DispatchConfig;
use ensemble_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw dispatch configuration from TOML
///
/// # Example
///
/// ```toml
/// [dispatch]
/// max_concurrent = 3
/// max_retries = 2
/// base_retry_delay_secs = 1.0
/// jitter_spread = 0.1
/// fallback_to_llm = false
/// deadline_multiplier = 1.5
/// default_timeout_secs = 120
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDispatchConfig {
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub base_retry_delay_secs: f64,
    pub jitter_spread: f64,
    /// Use the `[fallback]` worker for blocked or exhausted workers
    pub fallback_to_llm: bool,
    pub deadline_multiplier: f64,
    /// Timeout for workers without their own `timeout_secs`
    pub default_timeout_secs: u64,
}

impl Default for FileDispatchConfig {
    fn default() -> Self {
        let defaults = DispatchConfig::default();
        Self {
            max_concurrent: defaults.max_concurrent,
            max_retries: defaults.max_retries,
            base_retry_delay_secs: defaults.base_retry_delay.as_secs_f64(),
            jitter_spread: defaults.jitter_spread,
            fallback_to_llm: defaults.fallback_to_llm,
            deadline_multiplier: defaults.deadline_multiplier,
            default_timeout_secs: defaults.default_timeout.as_secs(),
        }
    }
}

impl FileDispatchConfig {
    /// Convert to the application config.
    ///
    /// A negative or non-finite retry delay falls back to the default;
    /// other values are passed through and checked by [`Self::issues`].
    pub fn to_dispatch_config(&self) -> DispatchConfig {
        let defaults = DispatchConfig::default();
        let base_retry_delay = Duration::try_from_secs_f64(self.base_retry_delay_secs)
            .unwrap_or(defaults.base_retry_delay);
        defaults
            .with_max_concurrent(self.max_concurrent)
            .with_max_retries(self.max_retries)
            .with_base_retry_delay(base_retry_delay)
            .with_jitter_spread(self.jitter_spread)
            .with_fallback(self.fallback_to_llm)
            .with_deadline_multiplier(self.deadline_multiplier)
            .with_default_timeout(Duration::from_secs(self.default_timeout_secs))
    }

    /// Range problems, all fatal.
    pub fn issues(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut out_of_range = |field: &str, message: String| {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: format!("dispatch.{field}"),
                },
                format!("dispatch.{field}: {message}"),
            ));
        };

        if self.max_concurrent == 0 {
            out_of_range("max_concurrent", "must be at least 1".to_string());
        }
        if !self.base_retry_delay_secs.is_finite() || self.base_retry_delay_secs < 0.0 {
            out_of_range(
                "base_retry_delay_secs",
                format!("must be >= 0, got {}", self.base_retry_delay_secs),
            );
        }
        if !(0.0..1.0).contains(&self.jitter_spread) {
            out_of_range(
                "jitter_spread",
                format!("must be in [0, 1), got {}", self.jitter_spread),
            );
        }
        if !self.deadline_multiplier.is_finite() || self.deadline_multiplier < 1.0 {
            out_of_range(
                "deadline_multiplier",
                format!("must be >= 1.0, got {}", self.deadline_multiplier),
            );
        }
        if self.default_timeout_secs == 0 {
            out_of_range("default_timeout_secs", "must be greater than 0".to_string());
        }
        issues
    }
}
