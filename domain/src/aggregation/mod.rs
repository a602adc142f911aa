//! Aggregation domain
//!
//! [`AggregationStrategy`] names the policy, [`reduce`] applies it to a list
//! of [`WorkResult`](crate::work::WorkResult)s, and [`AggregatedResult`] is
//! the decision returned to callers.

pub mod reduce;
pub mod result;
pub mod scoring;
pub mod strategy;

pub use reduce::{ReduceContext, reduce};
pub use result::{ALL_FAILED_ERROR, AggregatedResult, Metadata, Reduction};
pub use scoring::{DetailScorer, ResultScorer};
pub use strategy::{AggregationStrategy, DispatchMode};
