//! Errors raised while assembling a [`Bot`](crate::Bot).

use courier_config::ConfigError;
use courier_router::RegistrationError;
use courier_tasks::TaskError;
use thiserror::Error;

/// Result type for bot assembly.
pub type BotResult<T> = Result<T, BotError>;

/// Errors that can occur while building a bot.
#[derive(Debug, Error)]
pub enum BotError {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A handler could not be registered.
    #[error("handler registration failed: {0}")]
    Registration(#[from] RegistrationError),

    /// A background task could not be started.
    #[error("background task failed to start: {0}")]
    Task(#[from] TaskError),

    /// A required collaborator was not supplied.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}

impl BotError {
    /// Create a missing collaborator error.
    pub fn missing(collaborator: &'static str) -> Self {
        Self::MissingCollaborator(collaborator)
    }
}
