//! Error types for Courier.
//!
//! [`DispatchError`] is the error value that travels back up the middleware
//! chain next to the response. Each variant belongs to exactly one layer and
//! only that layer writes the user-facing text for it.
//!
//! | Kind | Origin | Counted as |
//! |---|---|---|
//! | `InvalidInput` | validation | success |
//! | `Throttled` | rate limit | failure |
//! | `NotRegistered` | auth | failure |
//! | `Handler` | handler or collaborator | failure |
//! | `DeadlineExceeded` | anything honoring the deadline | failure |
//! | `UnknownCommand` | router | success |

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Classification of a [`DispatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input rejected by validation.
    InvalidInput,
    /// Rate limit exceeded.
    Throttled,
    /// The user could not be looked up or registered.
    NotRegistered,
    /// A handler or one of its collaborators failed.
    Handler,
    /// The dispatch deadline expired.
    DeadlineExceeded,
    /// No handler claims the command token.
    UnknownCommand,
}

impl ErrorKind {
    /// Returns true if this kind counts against the system in metrics.
    ///
    /// Bad input and unknown commands are the user's doing, not ours.
    #[must_use]
    pub const fn counts_as_failure(self) -> bool {
        !matches!(self, Self::InvalidInput | Self::UnknownCommand)
    }

    /// Returns the snake_case name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Throttled => "throttled",
            Self::NotRegistered => "not_registered",
            Self::Handler => "handler",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::UnknownCommand => "unknown_command",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error surfaced from a dispatch to middleware observers.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Input rejected by validation.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What was wrong.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited: retry after {}s", retry_after.as_secs())]
    Throttled {
        /// Time until the oldest request leaves the window.
        retry_after: Duration,
    },

    /// User lookup or registration failed.
    #[error("registration failed: {message}")]
    NotRegistered {
        /// What failed.
        message: String,
        /// Underlying service error.
        #[source]
        source: Option<ServiceError>,
    },

    /// Handler failure.
    #[error("handler failed: {source}")]
    Handler {
        /// The handler's error.
        #[source]
        source: anyhow::Error,
    },

    /// Deadline expired before the dispatch finished.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// No handler claims the token.
    #[error("unknown command: {head:?}")]
    UnknownCommand {
        /// The unmatched token; empty for empty text.
        head: String,
    },
}

impl DispatchError {
    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a throttled error.
    #[must_use]
    pub const fn throttled(retry_after: Duration) -> Self {
        Self::Throttled { retry_after }
    }

    /// Creates a not-registered error.
    pub fn not_registered(message: impl Into<String>, source: Option<ServiceError>) -> Self {
        Self::NotRegistered {
            message: message.into(),
            source,
        }
    }

    /// Creates a handler error.
    pub fn handler(source: impl Into<anyhow::Error>) -> Self {
        Self::Handler {
            source: source.into(),
        }
    }

    /// Creates an unknown command error.
    pub fn unknown_command(head: impl Into<String>) -> Self {
        Self::UnknownCommand { head: head.into() }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Throttled { .. } => ErrorKind::Throttled,
            Self::NotRegistered { .. } => ErrorKind::NotRegistered,
            Self::Handler { .. } => ErrorKind::Handler,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::UnknownCommand { .. } => ErrorKind::UnknownCommand,
        }
    }

    /// Returns true if this error counts as a failed dispatch.
    #[must_use]
    pub const fn counts_as_failure(&self) -> bool {
        self.kind().counts_as_failure()
    }
}

/// Errors returned by external collaborators (user service, activity store).
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The backing store is unreachable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The request was refused (constraint violation, bad data).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The call did not finish before the deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Any other failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Creates a rejected error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}
