//! Aggregated result of one dispatch round.

use super::strategy::AggregationStrategy;
use crate::conflict::ConflictAssessment;
use crate::core::serde_duration;
use crate::work::WorkResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Open string-keyed diagnostics map (vote tallies, scores, merge counts, ...).
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Error note recorded when every task failed.
pub const ALL_FAILED_ERROR: &str = "All tools failed";

/// Strategy-level outcome before pipeline bookkeeping is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub success: bool,
    pub primary_output: String,
    pub winning_worker_id: Option<String>,
    pub conflict_info: Option<ConflictAssessment>,
    pub metadata: Metadata,
}

impl Reduction {
    /// Reduction with a chosen winner, named by its worker label.
    pub fn won_by(result: &WorkResult) -> Self {
        Self {
            success: true,
            primary_output: result.output.clone(),
            winning_worker_id: Some(result.worker_label().to_string()),
            conflict_info: None,
            metadata: Metadata::new(),
        }
    }

    /// Reduction with synthesized output and no single winner.
    pub fn synthesized(primary_output: String) -> Self {
        Self {
            success: true,
            primary_output,
            winning_worker_id: None,
            conflict_info: None,
            metadata: Metadata::new(),
        }
    }

    /// Reduction for a batch where nothing succeeded.
    pub fn all_failed() -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("error".to_string(), ALL_FAILED_ERROR.into());
        Self {
            success: false,
            primary_output: String::new(),
            winning_worker_id: None,
            conflict_info: None,
            metadata,
        }
    }

    pub fn with_conflict_info(mut self, assessment: ConflictAssessment) -> Self {
        self.conflict_info = Some(assessment);
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Final decision handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    /// True iff at least one work result succeeded
    pub success: bool,
    pub primary_output: String,
    pub strategy_used: AggregationStrategy,
    /// Dispatch order for wait-for-all strategies, completion order otherwise
    pub work_results: Vec<WorkResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_worker_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_info: Option<ConflictAssessment>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(with = "serde_duration")]
    pub execution_time: Duration,
}

impl AggregatedResult {
    pub fn from_reduction(
        strategy: AggregationStrategy,
        reduction: Reduction,
        work_results: Vec<WorkResult>,
        execution_time: Duration,
    ) -> Self {
        Self {
            success: reduction.success,
            primary_output: reduction.primary_output,
            strategy_used: strategy,
            work_results,
            winning_worker_id: reduction.winning_worker_id,
            conflict_info: reduction.conflict_info,
            metadata: reduction.metadata,
            execution_time,
        }
    }

    pub fn successful_count(&self) -> usize {
        self.work_results.iter().filter(|r| r.success).count()
    }

    pub fn failed_count(&self) -> usize {
        self.work_results.len() - self.successful_count()
    }

    /// Some, but not all, work results succeeded.
    pub fn is_partial(&self) -> bool {
        self.success && self.failed_count() > 0
    }

    pub fn meta(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }
}
