//! Values flowing back through the chain.

use courier_core::{DispatchError, ErrorKind, Response};

/// Result of a dispatch as seen by middleware on the return path.
///
/// The response is always deliverable; `error` tells observers why it may
/// not be the handler's own.
#[derive(Debug)]
pub struct Outcome {
    /// Reply to send.
    pub response: Response,
    /// What went wrong, if anything.
    pub error: Option<DispatchError>,
}

impl Outcome {
    /// A successful outcome.
    #[must_use]
    pub const fn ok(response: Response) -> Self {
        Self {
            response,
            error: None,
        }
    }

    /// An outcome carrying a user-facing response and the error behind it.
    #[must_use]
    pub const fn failed(response: Response, error: DispatchError) -> Self {
        Self {
            response,
            error: Some(error),
        }
    }

    /// Returns true if no error was recorded.
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the kind of the recorded error.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(DispatchError::kind)
    }

    /// Returns true if metrics should count this dispatch as failed.
    pub fn counts_as_failure(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(DispatchError::counts_as_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_ok_outcome() {
        let outcome = Outcome::ok(Response::plain("hi"));
        assert!(outcome.is_ok());
        assert!(!outcome.counts_as_failure());
        assert_eq!(outcome.error_kind(), None);
    }

    #[test]
    fn test_failure_classification() {
        let rejected = Outcome::failed(
            Response::plain("usage"),
            DispatchError::invalid_input("bad"),
        );
        assert!(!rejected.is_ok());
        assert!(!rejected.counts_as_failure());

        let throttled = Outcome::failed(
            Response::plain("slow down"),
            DispatchError::throttled(Duration::from_secs(3)),
        );
        assert!(throttled.counts_as_failure());
        assert_eq!(throttled.error_kind(), Some(ErrorKind::Throttled));
    }
}
