//! Handler contract.
//!
//! A [`Handler`] claims one or more command tokens and turns a [`Command`]
//! into a [`Response`]. Handlers never touch the router, metrics, or cache;
//! cross-cutting concerns belong to middleware.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use courier_core::{Command, DispatchContext, Handler, HandlerResult, Response};
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl Handler for Ping {
//!     fn prefixes(&self) -> &[&str] {
//!         &["/ping"]
//!     }
//!
//!     fn description(&self) -> &str {
//!         "Check that the bot is alive"
//!     }
//!
//!     fn usage(&self) -> &str {
//!         "/ping"
//!     }
//!
//!     async fn invoke(&self, _ctx: &DispatchContext, _cmd: &Command) -> HandlerResult {
//!         Ok(Response::plain("pong"))
//!     }
//! }
//!
//! assert!(Ping.claims("/ping"));
//! assert!(!Ping.claims("/PING"));
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::context::DispatchContext;
use crate::error::DispatchError;
use crate::response::Response;

/// Result type returned by [`Handler::invoke`].
pub type HandlerResult = Result<Response, HandlerError>;

/// A registered command handler.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Literal command tokens this handler claims, e.g. `["/repo", "/user"]`.
    fn prefixes(&self) -> &[&str];

    /// Returns true if this handler claims `token`.
    ///
    /// The default is an exact, case-sensitive comparison against
    /// [`prefixes`](Self::prefixes).
    fn claims(&self, token: &str) -> bool {
        self.prefixes().iter().any(|prefix| *prefix == token)
    }

    /// One-line description shown by `/help`.
    fn description(&self) -> &str;

    /// Usage hint, e.g. `/repo owner/name`.
    fn usage(&self) -> &str;

    /// Handles one command.
    async fn invoke(&self, ctx: &DispatchContext, cmd: &Command) -> HandlerResult;
}

/// Error returned by a handler.
///
/// Wraps any error convertible into [`anyhow::Error`], so handlers can use
/// `?` on their collaborators' errors directly. A handler that still has
/// something useful to say may attach a partial response, which is delivered
/// instead of the generic failure text.
#[derive(Debug)]
pub struct HandlerError {
    error: anyhow::Error,
    response: Option<Response>,
}

impl HandlerError {
    /// Creates a handler error.
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: error.into(),
            response: None,
        }
    }

    /// Creates a handler error from a message.
    pub fn msg(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self::new(anyhow::Error::msg(message))
    }

    /// Creates a deadline-exceeded error.
    #[must_use]
    pub fn deadline_exceeded() -> Self {
        Self::new(DispatchError::DeadlineExceeded)
    }

    /// Attaches a partial response to deliver despite the failure.
    #[must_use]
    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    /// Returns the underlying error.
    #[must_use]
    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    /// Returns true if the failure was caused by an expired deadline.
    #[must_use]
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(
            self.error.downcast_ref::<DispatchError>(),
            Some(DispatchError::DeadlineExceeded)
        )
    }

    /// Splits into the partial response and the dispatch error.
    #[must_use]
    pub fn into_parts(self) -> (Option<Response>, DispatchError) {
        let error = if self.is_deadline_exceeded() {
            DispatchError::DeadlineExceeded
        } else {
            DispatchError::handler(self.error)
        };
        (self.response, error)
    }
}

impl<E> From<E> for HandlerError
where
    E: Into<anyhow::Error>,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

/// Read-only description of a registered handler.
///
/// This is what the router hands out from `enumerate()`: enough to render a
/// help page, without exposing the handler itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerView {
    /// Claimed command tokens.
    pub prefixes: Vec<String>,
    /// One-line description.
    pub description: String,
    /// Usage hint.
    pub usage: String,
}

impl HandlerView {
    /// Describes `handler`.
    pub fn of(handler: &dyn Handler) -> Self {
        Self {
            prefixes: handler.prefixes().iter().map(|p| (*p).to_string()).collect(),
            description: handler.description().to_string(),
            usage: handler.usage().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Chat, User};

    struct Repo;

    #[async_trait]
    impl Handler for Repo {
        fn prefixes(&self) -> &[&str] {
            &["/repo", "/user"]
        }

        fn description(&self) -> &str {
            "GitHub lookups"
        }

        fn usage(&self) -> &str {
            "/repo owner/name"
        }

        async fn invoke(&self, _ctx: &DispatchContext, cmd: &Command) -> HandlerResult {
            let target = cmd
                .args()
                .next()
                .ok_or_else(|| HandlerError::msg("missing argument"))?;
            let parsed: u32 = target.parse()?;
            Ok(Response::plain(parsed.to_string()))
        }
    }

    #[test]
    fn test_claims_exact_match() {
        assert!(Repo.claims("/repo"));
        assert!(Repo.claims("/user"));
        assert!(!Repo.claims("/Repo"));
        assert!(!Repo.claims("/repos"));
    }

    #[tokio::test]
    async fn test_question_mark_converts_errors() {
        let ctx = DispatchContext::new();
        let cmd = Command::new("/repo abc", User::new(1), Chat::private(1));
        let err = Repo.invoke(&ctx, &cmd).await.unwrap_err();
        assert!(!err.is_deadline_exceeded());
        let (partial, error) = err.into_parts();
        assert!(partial.is_none());
        assert_eq!(error.kind(), crate::ErrorKind::Handler);
    }

    #[test]
    fn test_deadline_error_maps_to_deadline_kind() {
        let err = HandlerError::deadline_exceeded();
        assert!(err.is_deadline_exceeded());
        let (_, error) = err.into_parts();
        assert!(matches!(error, DispatchError::DeadlineExceeded));
    }

    #[test]
    fn test_partial_response_is_kept() {
        let err = HandlerError::msg("upstream 502").with_response(Response::plain("partial"));
        let (partial, _) = err.into_parts();
        assert_eq!(partial.unwrap().text, "partial");
    }

    #[test]
    fn test_handler_view() {
        let view = HandlerView::of(&Repo);
        assert_eq!(view.prefixes, vec!["/repo", "/user"]);
        assert_eq!(view.usage, "/repo owner/name");
    }
}
