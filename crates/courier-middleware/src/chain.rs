//! Frozen middleware chain.
//!
//! A [`Chain`] is assembled once through [`ChainBuilder`] and then shared by
//! every dispatch. Registration order is execution order: the first
//! middleware pushed is the outermost, so it sees the command first and the
//! outcome last.
//!
//! ## Standard Stages
//!
//! | Position | Stage        | Purpose                                        |
//! |----------|--------------|------------------------------------------------|
//! | 1        | Logging      | Log receipt and result with the command id     |
//! | 2        | Metrics      | Count and time every dispatch                  |
//! | 3        | Validation   | Sanitize text, check per-command argument form |
//! | 4        | Caching      | Serve repeated read-only commands              |
//! | 5        | Auth         | Resolve or register the sender                 |
//! | 6        | Activity     | Record successful commands                     |
//! | 7        | RateLimit    | Per-user sliding window                        |
//!
//! Metrics sits outside validation so rejected commands are still counted,
//! and caching sits outside auth and rate limiting so cache hits cost neither.

use crate::middleware::{Endpoint, Middleware, Next};
use crate::types::Outcome;
use courier_core::{Command, DispatchContext};
use std::sync::Arc;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An immutable, ordered list of middleware.
///
/// # Example
///
/// ```ignore
/// let chain = Chain::builder()
///     .push(LoggingMiddleware::new(logger.clone()))
///     .push(MetricsMiddleware::new(registry.clone(), logger))
///     .build();
///
/// let outcome = chain.run(&mut ctx, cmd, &endpoint).await;
/// ```
#[derive(Clone)]
pub struct Chain {
    middleware: Arc<[BoxedMiddleware]>,
}

impl Default for Chain {
    fn default() -> Self {
        ChainBuilder::new().build()
    }
}

impl Chain {
    /// Creates a new chain builder.
    #[must_use]
    pub fn builder() -> ChainBuilder {
        ChainBuilder::new()
    }

    /// Runs `cmd` through every middleware and then `endpoint`.
    pub async fn run(
        &self,
        ctx: &mut DispatchContext,
        cmd: Command,
        endpoint: &dyn Endpoint,
    ) -> Outcome {
        Next::new(&self.middleware, endpoint).run(ctx, cmd).await
    }

    /// Returns the middleware names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of middleware.
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Returns true if the chain holds no middleware.
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Returns true if the standard stages present appear in standard order.
    ///
    /// Middleware with non-standard names are ignored.
    pub fn follows_standard_order(&self) -> bool {
        let positions: Vec<Stage> = self
            .middleware
            .iter()
            .filter_map(|m| Stage::from_name(m.name()))
            .collect();
        positions.windows(2).all(|pair| pair[0] < pair[1])
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("middleware", &self.names()).finish()
    }
}

/// Builder for constructing a [`Chain`].
#[derive(Default)]
pub struct ChainBuilder {
    middleware: Vec<BoxedMiddleware>,
}

impl ChainBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware; it runs inside everything pushed before it.
    #[must_use]
    pub fn push<M: Middleware>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared middleware.
    #[must_use]
    pub fn push_shared(mut self, middleware: BoxedMiddleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Appends in place, for callers holding the builder by `&mut`.
    pub fn add(&mut self, middleware: BoxedMiddleware) {
        self.middleware.push(middleware);
    }

    /// Returns the number of middleware pushed so far.
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Returns true if nothing has been pushed.
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Freezes the chain.
    #[must_use]
    pub fn build(self) -> Chain {
        Chain {
            middleware: self.middleware.into(),
        }
    }
}

/// The standard stages, in outermost-first order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Stage 1: receipt and result logging
    Logging = 1,
    /// Stage 2: dispatch counters and slow warnings
    Metrics = 2,
    /// Stage 3: sanitizing and argument checks
    Validation = 3,
    /// Stage 4: response cache
    Caching = 4,
    /// Stage 5: user resolution and registration
    Auth = 5,
    /// Stage 6: activity recording
    Activity = 6,
    /// Stage 7: per-user sliding window
    RateLimit = 7,
}

impl Stage {
    /// Returns the stage name, as reported by its middleware.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Logging => "logging",
            Self::Metrics => "metrics",
            Self::Validation => "validation",
            Self::Caching => "caching",
            Self::Auth => "auth",
            Self::Activity => "activity",
            Self::RateLimit => "rate_limit",
        }
    }

    /// Looks a stage up by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|stage| stage.name() == name)
    }

    /// Returns the 1-based position in the standard order.
    #[must_use]
    pub const fn position(self) -> u8 {
        self as u8
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 7] {
        [
            Self::Logging,
            Self::Metrics,
            Self::Validation,
            Self::Caching,
            Self::Auth,
            Self::Activity,
            Self::RateLimit,
        ]
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::BoxFuture;
    use courier_core::{Chat, Response, User};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A test middleware that records its invocation order on both paths.
    struct OrderTrackingMiddleware {
        name: &'static str,
        counter: Arc<AtomicUsize>,
        order: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl Middleware for OrderTrackingMiddleware {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut DispatchContext,
            cmd: Command,
            next: Next<'a>,
        ) -> BoxFuture<'a, Outcome> {
            let counter = self.counter.clone();
            let order = self.order.clone();
            let name = self.name;

            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                order.lock().unwrap().push(format!("{name}:in"));

                let outcome = next.run(ctx, cmd).await;

                order.lock().unwrap().push(format!("{name}:out"));
                outcome
            })
        }
    }

    struct ShortCircuit;

    impl Middleware for ShortCircuit {
        fn name(&self) -> &'static str {
            "short_circuit"
        }

        fn process<'a>(
            &'a self,
            _ctx: &'a mut DispatchContext,
            _cmd: Command,
            _next: Next<'a>,
        ) -> BoxFuture<'a, Outcome> {
            Box::pin(async { Outcome::ok(Response::plain("stopped")) })
        }
    }

    struct Handler {
        calls: Arc<AtomicUsize>,
    }

    impl Endpoint for Handler {
        fn call<'a>(&'a self, _ctx: &'a mut DispatchContext, _cmd: Command) -> BoxFuture<'a, Outcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Outcome::ok(Response::plain("handler")) })
        }
    }

    fn tracker(
        name: &'static str,
        counter: &Arc<AtomicUsize>,
        order: &Arc<std::sync::Mutex<Vec<String>>>,
    ) -> OrderTrackingMiddleware {
        OrderTrackingMiddleware {
            name,
            counter: counter.clone(),
            order: order.clone(),
        }
    }

    fn command() -> Command {
        Command::new("/ping", User::new(1), Chat::private(1))
    }

    #[tokio::test]
    async fn test_chain_executes_in_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let chain = Chain::builder()
            .push(tracker("a", &counter, &order))
            .push(tracker("b", &counter, &order))
            .push(tracker("c", &counter, &order))
            .build();

        let mut ctx = DispatchContext::new();
        let outcome = chain
            .run(&mut ctx, command(), &Handler { calls: calls.clone() })
            .await;

        assert_eq!(outcome.response.text, "handler");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *order.lock().unwrap(),
            vec!["a:in", "b:in", "c:in", "c:out", "b:out", "a:out"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_inner_stages() {
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let chain = Chain::builder()
            .push(tracker("outer", &counter, &order))
            .push(ShortCircuit)
            .push(tracker("inner", &counter, &order))
            .build();

        let mut ctx = DispatchContext::new();
        let outcome = chain
            .run(&mut ctx, command(), &Handler { calls: calls.clone() })
            .await;

        assert_eq!(outcome.response.text, "stopped");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(*order.lock().unwrap(), vec!["outer:in", "outer:out"]);
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let chain = Chain::builder().build();
        assert!(chain.is_empty());

        let calls = Arc::new(AtomicUsize::new(0));
        let mut ctx = DispatchContext::new();
        let outcome = chain
            .run(&mut ctx, command(), &Handler { calls: calls.clone() })
            .await;

        assert_eq!(outcome.response.text, "handler");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stage_ordering() {
        let all = Stage::all();
        assert!(all.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(all[0].name(), "logging");
        assert_eq!(all[6].name(), "rate_limit");
        assert_eq!(Stage::Auth.position(), 5);
    }

    #[test]
    fn test_stage_from_name() {
        for stage in Stage::all() {
            assert_eq!(Stage::from_name(stage.name()), Some(stage));
        }
        assert_eq!(Stage::from_name("compression"), None);
    }

    #[test]
    fn test_follows_standard_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let good = Chain::builder()
            .push(tracker("logging", &counter, &order))
            .push(tracker("custom", &counter, &order))
            .push(tracker("rate_limit", &counter, &order))
            .build();
        assert!(good.follows_standard_order());
        assert_eq!(good.names(), vec!["logging", "custom", "rate_limit"]);

        let bad = Chain::builder()
            .push(tracker("auth", &counter, &order))
            .push(tracker("validation", &counter, &order))
            .build();
        assert!(!bad.follows_standard_order());
    }
}
