//! Aggregation configuration from TOML (`[aggregation]` section)

use ensemble_application::AggregationConfig;
use ensemble_domain::{AggregationStrategy, ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};

/// Raw aggregation configuration from TOML
///
/// # Example
///
/// ```toml
/// [aggregation]
/// strategy = "consensus"     # first_success, all_complete, voting, best_score,
///                            # merge, smart_merge, consensus
/// consensus_threshold = 0.8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAggregationConfig {
    pub strategy: String,
    pub consensus_threshold: f64,
}

impl Default for FileAggregationConfig {
    fn default() -> Self {
        let defaults = AggregationConfig::default();
        Self {
            strategy: defaults.strategy.as_str().to_string(),
            consensus_threshold: defaults.consensus_threshold,
        }
    }
}

impl FileAggregationConfig {
    /// Parse the strategy name, returning warnings on failure.
    pub fn parse_strategy(&self) -> (AggregationStrategy, Vec<ConfigIssue>) {
        match self.strategy.parse::<AggregationStrategy>() {
            Ok(strategy) => (strategy, vec![]),
            Err(_) => {
                let fallback = AggregationStrategy::default();
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "aggregation.strategy".to_string(),
                        value: self.strategy.clone(),
                        valid_values: AggregationStrategy::valid_names(),
                    },
                    format!(
                        "aggregation.strategy: unknown value '{}', falling back to '{}'",
                        self.strategy, fallback
                    ),
                );
                (fallback, vec![issue])
            }
        }
    }

    pub fn to_aggregation_config(&self) -> (AggregationConfig, Vec<ConfigIssue>) {
        let (strategy, mut issues) = self.parse_strategy();
        if !(0.0..=1.0).contains(&self.consensus_threshold) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: "aggregation.consensus_threshold".to_string(),
                },
                format!(
                    "aggregation.consensus_threshold: must be in [0, 1], got {}",
                    self.consensus_threshold
                ),
            ));
        }
        let config = AggregationConfig::default()
            .with_strategy(strategy)
            .with_consensus_threshold(self.consensus_threshold);
        (config, issues)
    }
}
