//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application types.

mod aggregation;
mod dispatch;
mod workers;

pub use aggregation::FileAggregationConfig;
pub use dispatch::FileDispatchConfig;
pub use workers::FileWorkerConfig;

use ensemble_application::{AggregationConfig, DispatchConfig};
use ensemble_domain::{ConfigIssue, WorkerDescriptor};
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Retry, concurrency and deadline settings
    pub dispatch: FileDispatchConfig,
    /// Strategy selection
    pub aggregation: FileAggregationConfig,
    /// Worker roster
    pub workers: Vec<FileWorkerConfig>,
    /// Generic worker used when `dispatch.fallback_to_llm` is set
    pub fallback: Option<FileWorkerConfig>,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Checks value ranges, the strategy name and the worker roster.
    /// Command availability is a separate check, see [`Self::check_commands`].
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.dispatch.issues();
        issues.extend(self.aggregation.to_aggregation_config().1);
        issues.extend(workers::roster_issues(&self.workers));
        if let Some(fallback) = &self.fallback {
            issues.extend(workers::roster_issues(std::slice::from_ref(fallback)));
        }
        issues
    }

    /// Warnings for configured commands that are not installed.
    pub fn check_commands(&self) -> Vec<ConfigIssue> {
        workers::missing_commands(self.workers.iter().chain(self.fallback.as_ref()))
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        self.dispatch.to_dispatch_config()
    }

    pub fn aggregation_config(&self) -> AggregationConfig {
        self.aggregation.to_aggregation_config().0
    }

    pub fn worker_descriptors(&self) -> Vec<WorkerDescriptor> {
        let timeout = self.dispatch_config().default_timeout;
        self.workers
            .iter()
            .map(|w| w.to_descriptor(timeout))
            .collect()
    }

    pub fn fallback_descriptor(&self) -> Option<WorkerDescriptor> {
        let timeout = self.dispatch_config().default_timeout;
        self.fallback.as_ref().map(|w| w.to_descriptor(timeout))
    }
}
