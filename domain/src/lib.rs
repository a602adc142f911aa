//! Domain layer for copilot-ensemble
//!
//! Pure types and reductions with no I/O and no async runtime.
//!
//! # Core Concepts
//!
//! ## Work
//!
//! A [`Task`] asks one worker (a CLI coding assistant or an in-process
//! specialist agent) to answer a prompt; the outcome is a [`WorkResult`].
//! Failure text is classified into a [`FailureKind`] to decide whether a
//! retry is worthwhile.
//!
//! ## Circuit breaking
//!
//! [`BreakerRecord`] is the per-worker CLOSED / OPEN / HALF_OPEN state
//! machine; [`BreakerPolicy`] holds its thresholds and cooldowns.
//!
//! ## Aggregation
//!
//! An [`AggregationStrategy`] reduces several results into one
//! [`AggregatedResult`], consulting the [`ConflictDetector`] when outputs
//! have to be compared.

pub mod aggregation;
pub mod circuit;
pub mod conflict;
pub mod core;
pub mod work;

// Re-export commonly used types
pub use aggregation::{
    ALL_FAILED_ERROR, AggregatedResult, AggregationStrategy, DetailScorer, DispatchMode, Metadata,
    ReduceContext, Reduction, ResultScorer, reduce,
};
pub use circuit::{BreakerPolicy, BreakerRecord, CircuitState, HealthStatus, WorkerKind};
pub use conflict::{ConflictAssessment, ConflictDetector, ConflictSeverity, ConflictThresholds};
pub use core::{
    error::DomainError,
    validation::{ConfigIssue, ConfigIssueCode, Severity},
};
pub use work::{
    FailureKind, GENERIC_WORKER, PROMPT_PLACEHOLDER, Task, WorkResult, WorkerDescriptor,
    exit_code, unique_labels,
};
