//! Domain error types
//!
//! These are contract violations only. Worker-level failures never surface
//! here; they are carried as failed [`WorkResult`](crate::WorkResult) values.

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("No tasks to dispatch")]
    NoTasks,

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown aggregation strategy: {0}")]
    UnknownStrategy(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }

    /// Check if this error is a configuration problem
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidConfig(_) | DomainError::UnknownStrategy(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_error_display() {
        let error = DomainError::Cancelled;
        assert_eq!(error.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_is_cancelled_check() {
        assert!(DomainError::Cancelled.is_cancelled());
        assert!(!DomainError::NoTasks.is_cancelled());
        assert!(!DomainError::InvalidTask("empty prompt".to_string()).is_cancelled());
    }

    #[test]
    fn test_config_error_classification() {
        assert!(DomainError::InvalidConfig("max_concurrent".to_string()).is_config_error());
        assert!(DomainError::UnknownStrategy("best_of".to_string()).is_config_error());
        assert!(!DomainError::NoTasks.is_config_error());
    }
}
