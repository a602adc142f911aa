//! Circuit breaker domain.
//!
//! Pure policy and state-machine types. The shared, lock-guarded registry
//! that owns one [`BreakerRecord`] per worker lives in the application
//! layer (`WorkerGate`).

pub mod policy;
pub mod record;

pub use policy::{BreakerPolicy, WorkerKind};
pub use record::{BreakerRecord, CircuitState, HealthStatus, MAX_FAILURE_HISTORY};
