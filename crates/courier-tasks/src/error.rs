//! Error types for background task operations.

use thiserror::Error;

/// Result type for task operations.
pub type TaskResult<T> = Result<T, TaskError>;

/// Errors that can occur during task operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task registry has been closed.
    #[error("background tasks are shut down")]
    Shutdown,

    /// Failed to spawn a task.
    #[error("failed to spawn task: {0}")]
    SpawnFailed(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TaskError {
    /// Create a spawn failed error.
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed(reason.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            TaskError::Shutdown.to_string(),
            "background tasks are shut down"
        );
        assert_eq!(
            TaskError::spawn_failed("limit reached").to_string(),
            "failed to spawn task: limit reached"
        );
        assert_eq!(
            TaskError::invalid_config("zero period").to_string(),
            "invalid configuration: zero period"
        );
    }
}
