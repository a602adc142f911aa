//! Aggregation strategies.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// How the dispatcher schedules a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Return as soon as one task succeeds; cancel the rest
    FirstSuccess,
    /// Wait for every task (or the pipeline deadline)
    WaitForAll,
}

/// Policy for reducing several worker results into one decision.
///
/// # Example
///
/// ```
/// use ensemble_domain::{AggregationStrategy, DispatchMode};
///
/// let strategy: AggregationStrategy = "smart_merge".parse().unwrap();
/// assert_eq!(strategy, AggregationStrategy::SmartMerge);
/// assert_eq!(strategy.dispatch_mode(), DispatchMode::WaitForAll);
/// assert!(strategy.is_similarity_aware());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// First successful result wins
    FirstSuccess,
    /// Wait for all; first successful output is primary
    #[default]
    AllComplete,
    /// Largest group of identical (normalized) outputs wins
    Voting,
    /// Highest-scoring output wins
    BestScore,
    /// Concatenate every output under worker headers
    Merge,
    /// Longest output when outputs agree, structured merge otherwise
    SmartMerge,
    /// Similarity threshold consensus with weighted-vote fallback
    Consensus,
}

impl AggregationStrategy {
    pub const ALL: [AggregationStrategy; 7] = [
        AggregationStrategy::FirstSuccess,
        AggregationStrategy::AllComplete,
        AggregationStrategy::Voting,
        AggregationStrategy::BestScore,
        AggregationStrategy::Merge,
        AggregationStrategy::SmartMerge,
        AggregationStrategy::Consensus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationStrategy::FirstSuccess => "first_success",
            AggregationStrategy::AllComplete => "all_complete",
            AggregationStrategy::Voting => "voting",
            AggregationStrategy::BestScore => "best_score",
            AggregationStrategy::Merge => "merge",
            AggregationStrategy::SmartMerge => "smart_merge",
            AggregationStrategy::Consensus => "consensus",
        }
    }

    /// Scheduling mode the dispatcher must use for this strategy.
    pub fn dispatch_mode(&self) -> DispatchMode {
        match self {
            AggregationStrategy::FirstSuccess => DispatchMode::FirstSuccess,
            _ => DispatchMode::WaitForAll,
        }
    }

    /// Whether the strategy consults the conflict detector.
    pub fn is_similarity_aware(&self) -> bool {
        matches!(
            self,
            AggregationStrategy::SmartMerge | AggregationStrategy::Consensus
        )
    }

    pub fn valid_names() -> Vec<String> {
        Self::ALL.iter().map(|s| s.as_str().to_string()).collect()
    }
}

impl std::fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AggregationStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace('-', "_");
        match key.as_str() {
            "first_success" | "first" | "race" => Ok(AggregationStrategy::FirstSuccess),
            "all_complete" | "all" => Ok(AggregationStrategy::AllComplete),
            "voting" | "vote" => Ok(AggregationStrategy::Voting),
            "best_score" | "best" => Ok(AggregationStrategy::BestScore),
            "merge" => Ok(AggregationStrategy::Merge),
            "smart_merge" => Ok(AggregationStrategy::SmartMerge),
            "consensus" => Ok(AggregationStrategy::Consensus),
            _ => Err(DomainError::UnknownStrategy(s.to_string())),
        }
    }
}
