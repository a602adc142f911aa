//! Use cases

pub mod agent_batch;
pub mod aggregate;
pub mod dispatch;
