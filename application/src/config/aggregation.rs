//! Aggregation parameters.

use ensemble_domain::{AggregationStrategy, DomainError};
use serde::{Deserialize, Serialize};

/// Strategy selection and its tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub strategy: AggregationStrategy,
    /// Minimum similarity for the consensus strategy to skip the weighted vote
    pub consensus_threshold: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            strategy: AggregationStrategy::default(),
            consensus_threshold: 0.80,
        }
    }
}

impl AggregationConfig {
    pub fn with_strategy(mut self, strategy: AggregationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_consensus_threshold(mut self, threshold: f64) -> Self {
        self.consensus_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.consensus_threshold) {
            return Err(DomainError::InvalidConfig(format!(
                "consensus_threshold must be in [0, 1], got {}",
                self.consensus_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = AggregationConfig::default();
        assert_eq!(config.strategy, AggregationStrategy::AllComplete);
        assert_eq!(config.consensus_threshold, 0.80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_bounds() {
        let config = AggregationConfig::default().with_consensus_threshold(1.2);
        assert!(matches!(config.validate(), Err(DomainError::InvalidConfig(_))));
        let config = AggregationConfig::default().with_consensus_threshold(f64::NAN);
        assert!(config.validate().is_err());
        let config = AggregationConfig::default().with_consensus_threshold(0.0);
        assert!(config.validate().is_ok());
    }
}
