//! Application configuration
//!
//! - [`DispatchConfig`] — how tasks are scheduled, retried and cut off
//! - [`AggregationConfig`] — how results are reduced

pub mod aggregation;
pub mod dispatch;

pub use aggregation::AggregationConfig;
pub use dispatch::DispatchConfig;
