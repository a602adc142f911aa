//! Port definitions (interfaces for external dependencies)

pub mod clock;
pub mod progress;
pub mod worker_invoker;

pub use clock::{Clock, JitterSource, NoJitter};
pub use progress::{DispatchProgressNotifier, NoProgress};
pub use worker_invoker::{InvokeError, WorkerInvoker, WorkerOutput};
