//! Router construction and dispatch.
//!
//! Construction goes through [`RouterBuilder`]; [`RouterBuilder::build`]
//! consumes it and freezes the handler list and the middleware chain. A
//! built [`Router`] is immutable, so every registration happens before the
//! first dispatch.

use crate::catalog::Catalog;
use crate::endpoint::HandlerEndpoint;
use crate::error::RegistrationError;
use courier_core::{Command, DispatchContext, Handler, HandlerView, Logger, TracingLogger};
use courier_middleware::{BoxedMiddleware, Chain, ChainBuilder, Middleware, Outcome};
use std::collections::HashMap;
use std::sync::Arc;

/// Builder for [`Router`].
///
/// # Example
///
/// ```ignore
/// let mut builder = RouterBuilder::new();
/// builder.register_handler(Arc::new(RepoHandler::new(client)))?;
/// builder.register_handler(Arc::new(HelpHandler::new(builder.catalog())))?;
/// builder.register_middleware(LoggingMiddleware::new(logger));
/// let router = builder.build();
/// ```
pub struct RouterBuilder {
    handlers: Vec<Arc<dyn Handler>>,
    claimed: HashMap<String, usize>,
    chain: ChainBuilder,
    catalog: Catalog,
    logger: Arc<dyn Logger>,
}

impl RouterBuilder {
    /// Creates an empty builder logging through `tracing`.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            claimed: HashMap::new(),
            chain: ChainBuilder::new(),
            catalog: Catalog::new(),
            logger: Arc::new(TracingLogger),
        }
    }

    /// Sets the logger used for handler failures.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Registers a handler.
    ///
    /// Registering the same `Arc` twice is a no-op. A different handler
    /// claiming an already claimed prefix is rejected, as is a handler with
    /// no prefixes or a prefix that is empty or contains whitespace.
    pub fn register_handler(&mut self, handler: Arc<dyn Handler>) -> Result<(), RegistrationError> {
        if self.handlers.iter().any(|known| Arc::ptr_eq(known, &handler)) {
            return Ok(());
        }

        let prefixes = handler.prefixes();
        if prefixes.is_empty() {
            return Err(RegistrationError::invalid_prefix(
                "",
                "handler claims no prefixes",
            ));
        }

        for prefix in prefixes {
            if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
                return Err(RegistrationError::invalid_prefix(
                    *prefix,
                    "prefix must be a single non-empty token",
                ));
            }
            if let Some(&index) = self.claimed.get(*prefix) {
                return Err(RegistrationError::duplicate_prefix(
                    *prefix,
                    self.handlers[index].usage(),
                ));
            }
        }

        let index = self.handlers.len();
        for prefix in prefixes {
            self.claimed.insert((*prefix).to_string(), index);
        }
        tracing::debug!(prefixes = ?prefixes, "handler registered");
        self.handlers.push(handler);
        Ok(())
    }

    /// Appends a middleware. Registration order is execution order,
    /// outermost first.
    pub fn register_middleware<M: Middleware>(&mut self, middleware: M) {
        self.chain.add(Arc::new(middleware));
    }

    /// Appends an already shared middleware.
    pub fn register_shared_middleware(&mut self, middleware: BoxedMiddleware) {
        self.chain.add(middleware);
    }

    /// Returns the catalog that [`build`](Self::build) will fill.
    pub fn catalog(&self) -> Catalog {
        self.catalog.clone()
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Freezes the handlers and the chain.
    pub fn build(self) -> Router {
        let views: Vec<HandlerView> = self
            .handlers
            .iter()
            .map(|handler| HandlerView::of(handler.as_ref()))
            .collect();
        self.catalog.fill(views);

        let chain = self.chain.build();
        tracing::debug!(
            handlers = self.handlers.len(),
            middleware = ?chain.names(),
            "router built"
        );

        Router {
            chain,
            endpoint: Arc::new(HandlerEndpoint::new(self.handlers, self.logger)),
        }
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("handlers", &self.handlers.len())
            .field("middleware", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Immutable command router.
///
/// Cheap to clone; clones share the handlers and the chain.
#[derive(Clone)]
pub struct Router {
    chain: Chain,
    endpoint: Arc<HandlerEndpoint>,
}

impl Router {
    /// Creates a builder.
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Runs `cmd` through the chain and the matching handler.
    ///
    /// Always returns a non-empty response. Unknown commands, handler
    /// failures, panics and missed deadlines are reported in
    /// [`Outcome::error`].
    pub async fn dispatch(&self, ctx: &mut DispatchContext, cmd: Command) -> Outcome {
        self.chain.run(ctx, cmd, self.endpoint.as_ref()).await
    }

    /// Describes the registered handlers in registration order.
    pub fn enumerate(&self) -> Vec<HandlerView> {
        self.endpoint
            .handlers()
            .iter()
            .map(|handler| HandlerView::of(handler.as_ref()))
            .collect()
    }

    /// Returns the frozen middleware chain.
    pub fn chain(&self) -> &Chain {
        &self.chain
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("handlers", &self.endpoint.handlers().len())
            .field("middleware", &self.chain.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{replies, ErrorKind, Level, Response};
    use courier_test::{command, RecordingLogger, StaticHandler};
    use std::time::Duration;

    async fn dispatch(router: &Router, text: &str) -> Outcome {
        let mut ctx = DispatchContext::new();
        router.dispatch(&mut ctx, command(text, 1)).await
    }

    fn router_with(handlers: Vec<StaticHandler>) -> (Router, Arc<RecordingLogger>) {
        let logger = Arc::new(RecordingLogger::new());
        let mut builder = RouterBuilder::new().with_logger(logger.clone());
        for handler in handlers {
            builder.register_handler(Arc::new(handler)).unwrap();
        }
        (builder.build(), logger)
    }

    #[tokio::test]
    async fn test_dispatch_to_handler() {
        let (router, _) = router_with(vec![
            StaticHandler::new(&["/ping"], "pong"),
            StaticHandler::new(&["/repo", "/r"], "repo"),
        ]);

        assert_eq!(dispatch(&router, "/ping").await.response.text, "pong");
        assert_eq!(dispatch(&router, "/r a/b").await.response.text, "repo");
        assert_eq!(dispatch(&router, "/ping@courier_bot").await.response.text, "pong");
    }

    #[tokio::test]
    async fn test_unknown_and_empty() {
        let (router, _) = router_with(vec![StaticHandler::new(&["/ping"], "pong")]);

        for text in ["/nope", "", "   ", "/PING", "hello"] {
            let outcome = dispatch(&router, text).await;
            assert_eq!(outcome.response.text, replies::UNKNOWN_COMMAND, "{text:?}");
            assert_eq!(outcome.error_kind(), Some(ErrorKind::UnknownCommand));
            assert!(!outcome.counts_as_failure());
        }
    }

    #[test]
    fn test_duplicate_prefix_rejected() {
        let mut builder = RouterBuilder::new();
        builder
            .register_handler(Arc::new(StaticHandler::new(&["/repo"], "a").with_usage("/repo owner/name")))
            .unwrap();

        let err = builder
            .register_handler(Arc::new(StaticHandler::new(&["/r", "/repo"], "b")))
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::duplicate_prefix("/repo", "/repo owner/name")
        );
        assert_eq!(builder.handler_count(), 1);
    }

    #[test]
    fn test_same_handler_registration_is_idempotent() {
        let handler: Arc<dyn Handler> = Arc::new(StaticHandler::new(&["/ping"], "pong"));
        let mut builder = RouterBuilder::new();
        builder.register_handler(handler.clone()).unwrap();
        builder.register_handler(handler).unwrap();

        assert_eq!(builder.build().enumerate().len(), 1);
    }

    #[test]
    fn test_invalid_prefixes_rejected() {
        let mut builder = RouterBuilder::new();
        for prefixes in [&[][..], &[""][..], &["/two words"][..]] {
            let err = builder
                .register_handler(Arc::new(StaticHandler::new(prefixes, "x")))
                .unwrap_err();
            assert!(matches!(err, RegistrationError::InvalidPrefix { .. }));
        }
    }

    #[test]
    fn test_enumerate_in_registration_order() {
        let (router, _) = router_with(vec![
            StaticHandler::new(&["/weather"], "w").with_description("Weather"),
            StaticHandler::new(&["/ping"], "p").with_description("Ping"),
        ]);

        let views = router.enumerate();
        assert_eq!(views[0].prefixes, vec!["/weather".to_string()]);
        assert_eq!(views[0].description, "Weather");
        assert_eq!(views[1].prefixes, vec!["/ping".to_string()]);
    }

    #[tokio::test]
    async fn test_handler_failure_uses_generic_reply() {
        let (router, logger) = router_with(vec![StaticHandler::new(&["/repo"], "").failing("github down")]);

        let mut ctx = DispatchContext::new();
        let cmd = command("/repo a/b", 1);
        let id = cmd.id.to_string();
        let outcome = router.dispatch(&mut ctx, cmd).await;

        assert_eq!(outcome.response.text, replies::GENERIC_FAILURE);
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Handler));

        let errors = logger.records_at(Level::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field("command_id"), Some(id.as_str()));
        assert!(errors[0].field("error").unwrap().contains("github down"));
    }

    #[tokio::test]
    async fn test_partial_response_delivered() {
        let (router, _) = router_with(vec![StaticHandler::new(&["/stats"], "")
            .failing_with("store timed out", Response::plain("Users: 12 (activity unavailable)"))]);

        let outcome = dispatch(&router, "/stats").await;
        assert_eq!(outcome.response.text, "Users: 12 (activity unavailable)");
        assert!(outcome.counts_as_failure());
    }

    #[tokio::test]
    async fn test_empty_partial_falls_back() {
        let (router, _) = router_with(vec![
            StaticHandler::new(&["/a"], "").failing_with("x", Response::plain("   ")),
            StaticHandler::new(&["/b"], ""),
        ]);

        for text in ["/a", "/b"] {
            let outcome = dispatch(&router, text).await;
            assert_eq!(outcome.response.text, replies::GENERIC_FAILURE);
            assert_eq!(outcome.error_kind(), Some(ErrorKind::Handler));
        }
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let (router, logger) = router_with(vec![StaticHandler::new(&["/boom"], "").panicking("kaboom")]);

        let outcome = dispatch(&router, "/boom").await;
        assert_eq!(outcome.response.text, replies::GENERIC_FAILURE);
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Handler));
        assert!(logger.records_at(Level::Error)[0]
            .field("error")
            .unwrap()
            .contains("kaboom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_handler() {
        let handler = Arc::new(StaticHandler::new(&["/slow"], "late").with_delay(Duration::from_secs(5)));
        let mut builder = RouterBuilder::new();
        builder.register_handler(handler.clone()).unwrap();
        let router = builder.build();

        let mut ctx = DispatchContext::new().with_timeout(Duration::from_secs(1));
        let outcome = router.dispatch(&mut ctx, command("/slow", 1)).await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::DeadlineExceeded));
        assert_eq!(outcome.response.text, replies::GENERIC_FAILURE);
        assert_eq!(handler.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_skips_handler() {
        let handler = Arc::new(StaticHandler::new(&["/ping"], "pong"));
        let mut builder = RouterBuilder::new();
        builder.register_handler(handler.clone()).unwrap();
        let router = builder.build();

        let mut ctx = DispatchContext::new().with_timeout(Duration::from_millis(5));
        tokio::time::advance(Duration::from_millis(10)).await;
        let outcome = router.dispatch(&mut ctx, command("/ping", 1)).await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::DeadlineExceeded));
        assert_eq!(handler.calls(), 0);
    }

    #[tokio::test]
    async fn test_custom_claims() {
        struct EchoFamily;

        #[async_trait::async_trait]
        impl Handler for EchoFamily {
            fn prefixes(&self) -> &[&str] {
                &["/echo"]
            }
            fn claims(&self, token: &str) -> bool {
                token.starts_with("/echo")
            }
            fn description(&self) -> &str {
                "Echo"
            }
            fn usage(&self) -> &str {
                "/echo <text>"
            }
            async fn invoke(&self, _ctx: &DispatchContext, cmd: &Command) -> courier_core::HandlerResult {
                Ok(Response::plain(cmd.text.clone()))
            }
        }

        let mut builder = RouterBuilder::new();
        builder.register_handler(Arc::new(EchoFamily)).unwrap();
        let router = builder.build();

        assert_eq!(dispatch(&router, "/echo2 hi").await.response.text, "/echo2 hi");
    }
}
