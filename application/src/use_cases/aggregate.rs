//! Aggregate use case
//!
//! Drives the [`Dispatcher`] in the scheduling mode the strategy needs,
//! then reduces the results into one [`AggregatedResult`].

use super::dispatch::{DispatchError, Dispatcher};
use crate::config::AggregationConfig;
use crate::ports::WorkerInvoker;
use ensemble_domain::{
    AggregatedResult, AggregationStrategy, ConflictDetector, DetailScorer, DispatchMode,
    DomainError, ReduceContext, ResultScorer, Task, reduce,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during aggregation
///
/// Only contract violations; a batch where every worker failed is a
/// successful call returning `success == false`.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Reduces a batch of worker results into one decision.
pub struct Aggregator<I: WorkerInvoker + 'static> {
    dispatcher: Dispatcher<I>,
    config: AggregationConfig,
    detector: ConflictDetector,
    scorer: Arc<dyn ResultScorer>,
}

impl<I: WorkerInvoker + 'static> Aggregator<I> {
    pub fn new(dispatcher: Dispatcher<I>, config: AggregationConfig) -> Self {
        Self {
            dispatcher,
            config,
            detector: ConflictDetector::new(),
            scorer: Arc::new(DetailScorer),
        }
    }

    pub fn with_detector(mut self, detector: ConflictDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Replace the best-score scoring function.
    pub fn with_scorer(mut self, scorer: Arc<dyn ResultScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher<I> {
        &self.dispatcher
    }

    /// Aggregate with the configured strategy.
    pub async fn aggregate(&self, tasks: Vec<Task>) -> Result<AggregatedResult, AggregateError> {
        self.aggregate_with(tasks, self.config.strategy).await
    }

    /// Aggregate with an explicit strategy.
    pub async fn aggregate_with(
        &self,
        tasks: Vec<Task>,
        strategy: AggregationStrategy,
    ) -> Result<AggregatedResult, AggregateError> {
        if tasks.is_empty() {
            return Err(DomainError::NoTasks.into());
        }
        self.config.validate()?;

        let clock = self.dispatcher.clock();
        let started = clock.now();
        let mode = strategy.dispatch_mode();
        info!(
            "Aggregating {} task(s) with {} strategy",
            tasks.len(),
            strategy
        );

        let weights: Vec<f64> = match mode {
            DispatchMode::WaitForAll => tasks.iter().map(Task::weight).collect(),
            DispatchMode::FirstSuccess => Vec::new(),
        };

        let report = self.dispatcher.dispatch_all(tasks, mode).await?;

        let ctx = ReduceContext {
            detector: &self.detector,
            scorer: self.scorer.as_ref(),
            consensus_threshold: self.config.consensus_threshold,
        };
        let mut reduction = reduce(strategy, &report.results, &weights, &ctx);
        if let Some(conflict) = &reduction.conflict_info {
            debug!(
                "Conflict severity {} (similarity {:.2})",
                conflict.severity.as_str(),
                conflict.similarity_score
            );
        }
        reduction.metadata.extend(report.metadata());

        let execution_time = clock.now().saturating_duration_since(started);
        let result =
            AggregatedResult::from_reduction(strategy, reduction, report.results, execution_time);

        info!(
            "Aggregation finished: success={}, {}/{} succeeded, winner={}",
            result.success,
            result.successful_count(),
            result.work_results.len(),
            result.winning_worker_id.as_deref().unwrap_or("-")
        );
        Ok(result)
    }
}
