//! Application layer for copilot-ensemble
//!
//! This crate contains the use cases (dispatch, aggregation, agent batches),
//! the shared worker gate, port definitions and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;
pub mod worker_gate;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{AggregationConfig, DispatchConfig};
pub use ports::{
    Clock, DispatchProgressNotifier, InvokeError, JitterSource, NoJitter, NoProgress,
    WorkerInvoker, WorkerOutput,
};
pub use use_cases::agent_batch::{
    AgentBatchError, AgentBatchUseCase, BatchOutcome, ExecutionMetadata, SubgoalAssignment,
    SubgoalResult,
};
pub use use_cases::aggregate::{AggregateError, Aggregator};
pub use use_cases::dispatch::{DispatchError, DispatchReport, Dispatcher, EarlyTermination};
pub use worker_gate::{Admission, WorkerGate};
