//! Scriptable handler.

use async_trait::async_trait;
use courier_core::{Command, DispatchContext, Handler, HandlerError, HandlerResult, Response, UserRecord};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Behavior {
    Reply(Response),
    Fail(String),
    FailWith(String, Response),
    Panic(String),
}

/// A [`Handler`] with a fixed behavior that records what it saw.
///
/// # Example
///
/// ```
/// use courier_test::StaticHandler;
/// use std::time::Duration;
///
/// let slow = StaticHandler::new(&["/slow"], "done").with_delay(Duration::from_millis(2100));
/// let broken = StaticHandler::new(&["/boom"], "").failing("upstream timed out");
/// ```
#[derive(Debug)]
pub struct StaticHandler {
    prefixes: Vec<&'static str>,
    description: String,
    usage: String,
    behavior: Behavior,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_user: Mutex<Option<UserRecord>>,
    last_text: Mutex<Option<String>>,
}

impl StaticHandler {
    /// Creates a handler that replies with `reply` in plain text.
    pub fn new(prefixes: &[&'static str], reply: impl Into<String>) -> Self {
        Self::with_response(prefixes, Response::plain(reply))
    }

    /// Creates a handler that replies with `response`.
    pub fn with_response(prefixes: &[&'static str], response: Response) -> Self {
        let first = prefixes.first().copied().unwrap_or_default();
        Self {
            prefixes: prefixes.to_vec(),
            description: format!("Test handler for {first}"),
            usage: first.to_string(),
            behavior: Behavior::Reply(response),
            delay: None,
            calls: AtomicUsize::new(0),
            last_user: Mutex::new(None),
            last_text: Mutex::new(None),
        }
    }

    /// Sleeps before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the usage hint.
    #[must_use]
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Fails every invocation with `message`.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.behavior = Behavior::Fail(message.into());
        self
    }

    /// Fails every invocation but still offers `partial`.
    #[must_use]
    pub fn failing_with(mut self, message: impl Into<String>, partial: Response) -> Self {
        self.behavior = Behavior::FailWith(message.into(), partial);
        self
    }

    /// Panics on every invocation.
    #[must_use]
    pub fn panicking(mut self, message: impl Into<String>) -> Self {
        self.behavior = Behavior::Panic(message.into());
        self
    }

    /// Number of invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The context user seen by the most recent invocation.
    pub fn last_user(&self) -> Option<UserRecord> {
        self.last_user.lock().clone()
    }

    /// The command text seen by the most recent invocation.
    pub fn last_text(&self) -> Option<String> {
        self.last_text.lock().clone()
    }
}

#[async_trait]
impl Handler for StaticHandler {
    fn prefixes(&self) -> &[&str] {
        &self.prefixes
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn usage(&self) -> &str {
        &self.usage
    }

    async fn invoke(&self, ctx: &DispatchContext, cmd: &Command) -> HandlerResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_user.lock() = ctx.user().cloned();
        *self.last_text.lock() = Some(cmd.text.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            Behavior::Reply(response) => Ok(response.clone()),
            Behavior::Fail(message) => Err(HandlerError::msg(message.clone())),
            Behavior::FailWith(message, partial) => {
                Err(HandlerError::msg(message.clone()).with_response(partial.clone()))
            }
            Behavior::Panic(message) => panic!("{message}"),
        }
    }
}
