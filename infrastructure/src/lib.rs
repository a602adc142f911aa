//! Infrastructure layer for copilot-ensemble
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: subprocess and in-process worker invokers, the tokio
//! backed clock, random retry jitter, tracing progress output, and the
//! TOML configuration loader.

pub mod config;
pub mod progress;
pub mod runtime;
pub mod workers;

pub use config::{ConfigLoader, FileConfig};
pub use progress::TracingProgress;
pub use runtime::{SystemClock, ThreadRngJitter};
pub use workers::{CliWorkerError, CliWorkerInvoker, InProcessInvoker};
