//! Agent batch use case
//!
//! Runs one subgoal per assignment against internally spawned specialist
//! agents and reports execution metadata for the orchestrator. Ad-hoc
//! agents are put on the lenient breaker policy before anything runs.

use super::dispatch::{DispatchError, Dispatcher, EarlyTermination};
use crate::ports::WorkerInvoker;
use ensemble_domain::{DispatchMode, DomainError, Metadata, Task, WorkResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors that can occur before a batch runs
#[derive(Error, Debug)]
pub enum AgentBatchError {
    #[error("Invalid assignment for subgoal {subgoal_id}: {source}")]
    InvalidAssignment {
        subgoal_id: String,
        #[source]
        source: DomainError,
    },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// One subgoal routed to one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgoalAssignment {
    pub subgoal_id: String,
    pub agent_id: String,
    pub prompt: String,
    /// Agent was spawned for this batch
    #[serde(default)]
    pub adhoc: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl SubgoalAssignment {
    pub fn new(
        subgoal_id: impl Into<String>,
        agent_id: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            subgoal_id: subgoal_id.into(),
            agent_id: agent_id.into(),
            prompt: prompt.into(),
            adhoc: false,
            weight: 1.0,
        }
    }

    pub fn adhoc(mut self) -> Self {
        self.adhoc = true;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Result of one subgoal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgoalResult {
    pub subgoal_id: String,
    pub result: WorkResult,
}

/// Batch-level bookkeeping for the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub total_subgoals: usize,
    pub failed_subgoals: usize,
    pub circuit_blocked_count: usize,
    pub spawn_count: usize,
    pub spawned_agents: Vec<String>,
    pub early_terminations: Vec<EarlyTermination>,
    pub fallback_agents: Vec<String>,
    pub deadline_exceeded: bool,
}

impl ExecutionMetadata {
    /// Open string-keyed form, as merged into aggregation metadata.
    pub fn to_map(&self) -> Metadata {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => Metadata::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// One entry per assignment, in assignment order
    pub results: Vec<SubgoalResult>,
    pub metadata: ExecutionMetadata,
}

/// Use case for running a batch of subgoals on agents
pub struct AgentBatchUseCase<I: WorkerInvoker + 'static> {
    dispatcher: Dispatcher<I>,
}

impl<I: WorkerInvoker + 'static> AgentBatchUseCase<I> {
    pub fn new(dispatcher: Dispatcher<I>) -> Self {
        Self { dispatcher }
    }

    pub async fn execute(
        &self,
        assignments: Vec<SubgoalAssignment>,
    ) -> Result<BatchOutcome, AgentBatchError> {
        let timeout = self.dispatcher.config().default_timeout;
        let mut tasks = Vec::with_capacity(assignments.len());
        for assignment in &assignments {
            let task = Task::new(&assignment.agent_id, &assignment.prompt, timeout)
                .map_err(|source| AgentBatchError::InvalidAssignment {
                    subgoal_id: assignment.subgoal_id.clone(),
                    source,
                })?
                .with_weight(assignment.weight);
            tasks.push(task);
        }

        let mut spawned_agents: Vec<String> = Vec::new();
        for assignment in assignments.iter().filter(|a| a.adhoc) {
            if !spawned_agents.contains(&assignment.agent_id) {
                self.dispatcher.gate().mark_as_adhoc(&assignment.agent_id);
                spawned_agents.push(assignment.agent_id.clone());
            }
        }

        info!(
            "Running {} subgoal(s) ({} ad-hoc agent(s))",
            assignments.len(),
            spawned_agents.len()
        );

        let report = self
            .dispatcher
            .dispatch_all(tasks, DispatchMode::WaitForAll)
            .await?;

        let failed_subgoals = report.failed();
        let metadata = ExecutionMetadata {
            total_subgoals: assignments.len(),
            failed_subgoals,
            circuit_blocked_count: report.circuit_blocked_count,
            spawn_count: spawned_agents.len(),
            spawned_agents,
            early_terminations: report.early_terminations,
            fallback_agents: report.fallback_agents,
            deadline_exceeded: report.deadline_exceeded,
        };

        let results = assignments
            .into_iter()
            .zip(report.results)
            .map(|(assignment, result)| SubgoalResult {
                subgoal_id: assignment.subgoal_id,
                result,
            })
            .collect();

        Ok(BatchOutcome { results, metadata })
    }
}
