//! Worker invoker adapters

pub mod cli;
pub mod in_process;

pub use cli::{CliWorkerError, CliWorkerInvoker};
pub use in_process::InProcessInvoker;
