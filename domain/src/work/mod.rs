//! Units of work and their outcomes.
//!
//! - [`Task`] — one worker invocation request (immutable)
//! - [`WorkResult`] — outcome of one task
//! - [`FailureKind`] — classification of failure text
//! - [`WorkerDescriptor`] — how a worker is invoked

pub mod descriptor;
pub mod failure;
pub mod result;
pub mod task;

pub use descriptor::{PROMPT_PLACEHOLDER, WorkerDescriptor};
pub use failure::FailureKind;
pub use result::{WorkResult, exit_code, unique_labels};
pub use task::{GENERIC_WORKER, Task};
