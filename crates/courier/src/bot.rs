//! Standard-stack assembly.
//!
//! [`BotBuilder`] turns a [`CourierConfig`] and the external collaborators
//! into a ready [`Bot`]: it creates the shared cache, metrics registry and
//! background task registry, installs the seven middleware stages in their
//! standard order, and registers the handlers.
//!
//! ```text
//! Logging → Metrics → Validation → Caching → Auth → Activity → RateLimit → handler
//! ```

use crate::error::{BotError, BotResult};
use courier_cache::CacheConfig;
use courier_config::CourierConfig;
use courier_core::{ActivityStore, Command, DispatchContext, Handler, HandlerView, Logger, TracingLogger, UserService};
use courier_middleware::stages::{
    ActivityMiddleware, AuthMiddleware, CachePolicy, CachingMiddleware, LoggingMiddleware,
    MetricsMiddleware, RateLimitConfig, RateLimitMiddleware, ResponseCache, ValidationMiddleware,
};
use courier_middleware::Outcome;
use courier_router::{HelpHandler, Router};
use courier_tasks::BackgroundTasks;
use courier_telemetry::{MetricsRegistry, MetricsSnapshot};
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`Bot`].
///
/// The user service and activity store are required; everything else has a
/// default.
pub struct BotBuilder {
    config: CourierConfig,
    users: Option<Arc<dyn UserService>>,
    activity: Option<Arc<dyn ActivityStore>>,
    logger: Arc<dyn Logger>,
    tasks: Option<BackgroundTasks>,
    validation: Option<ValidationMiddleware>,
    handlers: Vec<Arc<dyn Handler>>,
    help: Option<String>,
}

impl BotBuilder {
    /// Creates a builder for `config`.
    pub fn new(config: CourierConfig) -> Self {
        Self {
            config,
            users: None,
            activity: None,
            logger: Arc::new(TracingLogger),
            tasks: None,
            validation: None,
            handlers: Vec::new(),
            help: None,
        }
    }

    /// Sets the user service consulted by the auth stage.
    pub fn with_user_service(mut self, users: Arc<dyn UserService>) -> Self {
        self.users = Some(users);
        self
    }

    /// Sets the activity store written by the activity stage.
    pub fn with_activity_store(mut self, store: Arc<dyn ActivityStore>) -> Self {
        self.activity = Some(store);
        self
    }

    /// Sets the logger shared by the middleware and the router.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Runs background work on `tasks` instead of a private registry.
    pub fn with_tasks(mut self, tasks: BackgroundTasks) -> Self {
        self.tasks = Some(tasks);
        self
    }

    /// Replaces the default validation rules.
    ///
    /// The configured `validation.max_length` is ignored in favor of the
    /// limit carried by `validation`.
    pub fn with_validation(mut self, validation: ValidationMiddleware) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Adds a handler. Registration happens in [`build`](Self::build), in
    /// the order handlers were added.
    pub fn handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Adds `/help`, listing every registered handler under `title`.
    pub fn with_help(mut self, title: impl Into<String>) -> Self {
        self.help = Some(title.into());
        self
    }

    fn cache_policy(config: &CourierConfig) -> CachePolicy {
        let mut policy = CachePolicy::empty(config.cache.default_ttl());
        for prefix in &config.cacheable_prefixes {
            policy = policy.cacheable_for(prefix.clone(), config.cache.ttl_for(prefix));
        }
        match &config.cache.hit_marker {
            Some(marker) => policy.with_hit_marker(marker.clone()),
            None => policy,
        }
    }

    fn cache_config(config: &CourierConfig) -> CacheConfig {
        let cache = CacheConfig::default()
            .with_default_ttl(config.cache.default_ttl())
            .with_sweep_interval(config.cache.sweep_interval());
        match config.cache.max_entries {
            Some(max) => cache.with_max_entries(max),
            None => cache,
        }
    }

    /// Validates the configuration and assembles the bot.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, a missing collaborator, a handler
    /// whose prefix is already claimed, or a closed task registry.
    pub fn build(self) -> BotResult<Bot> {
        let config = self.config;
        config.validate()?;

        let users = self.users.ok_or_else(|| BotError::missing("user service"))?;
        let activity = self.activity.ok_or_else(|| BotError::missing("activity store"))?;
        let tasks = self.tasks.unwrap_or_default();
        let logger = self.logger;

        let registry = Arc::new(MetricsRegistry::new());

        let cache = ResponseCache::with_sweeper(Self::cache_config(&config), &tasks)?;

        let rate_limit = RateLimitMiddleware::new(
            RateLimitConfig::default()
                .with_max_requests(config.ratelimit.max)
                .with_window(config.ratelimit.window())
                .with_cleanup_interval(config.ratelimit.cleanup_interval()),
        );
        rate_limit.spawn_housekeeper(&tasks)?;

        let validation = self
            .validation
            .unwrap_or_else(|| ValidationMiddleware::with_default_rules(config.validation.max_length));

        let mut router = Router::builder().with_logger(logger.clone());
        let catalog = router.catalog();
        router.register_middleware(LoggingMiddleware::new(logger.clone()));
        router.register_middleware(
            MetricsMiddleware::new(registry.clone(), logger.clone())
                .with_slow_threshold(config.metrics.slow_threshold())
                .with_commands(Arc::new(catalog.clone())),
        );
        router.register_middleware(validation);
        router.register_middleware(CachingMiddleware::new(cache.clone(), Self::cache_policy(&config)));
        router.register_middleware(AuthMiddleware::new(users, tasks.clone(), logger.clone()));
        router.register_middleware(ActivityMiddleware::new(activity, tasks.clone(), logger.clone()));
        router.register_middleware(rate_limit);

        for handler in self.handlers {
            router.register_handler(handler)?;
        }
        if let Some(title) = self.help {
            let help = HelpHandler::new(catalog).with_title(title);
            router.register_handler(Arc::new(help))?;
        }

        let router = router.build();
        debug_assert!(router.chain().follows_standard_order());

        tracing::info!(
            handlers = router.enumerate().len(),
            stages = router.chain().len(),
            "bot assembled"
        );

        Ok(Bot {
            inner: Arc::new(BotInner {
                router,
                registry,
                cache,
                tasks,
                logger,
                deadline: config.dispatch.deadline(),
            }),
        })
    }
}

impl std::fmt::Debug for BotBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotBuilder")
            .field("handlers", &self.handlers.len())
            .field("help", &self.help)
            .finish_non_exhaustive()
    }
}

struct BotInner {
    router: Router,
    registry: Arc<MetricsRegistry>,
    cache: Arc<ResponseCache>,
    tasks: BackgroundTasks,
    logger: Arc<dyn Logger>,
    deadline: Duration,
}

/// An assembled command pipeline.
///
/// Cheap to clone; clones share the router, cache, metrics and background
/// tasks.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

impl Bot {
    /// Starts a builder with the default configuration.
    pub fn builder() -> BotBuilder {
        BotBuilder::new(CourierConfig::default())
    }

    /// Dispatches `cmd` with a fresh context carrying the configured deadline.
    pub async fn dispatch(&self, cmd: Command) -> Outcome {
        let mut ctx = DispatchContext::new().with_timeout(self.inner.deadline);
        self.inner.router.dispatch(&mut ctx, cmd).await
    }

    /// Dispatches `cmd` with a caller-supplied context.
    pub async fn dispatch_with(&self, ctx: &mut DispatchContext, cmd: Command) -> Outcome {
        self.inner.router.dispatch(ctx, cmd).await
    }

    /// Returns a point-in-time copy of the command metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.registry.snapshot()
    }

    /// Returns the live metrics registry.
    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.inner.registry
    }

    /// Lists the registered handlers in registration order.
    pub fn handlers(&self) -> Vec<HandlerView> {
        self.inner.router.enumerate()
    }

    /// Returns the response cache.
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.inner.cache
    }

    /// Returns the router.
    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    /// Returns the background task registry.
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.inner.tasks
    }

    /// Returns the logger shared by the pipeline.
    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.inner.logger
    }

    /// Returns the per-dispatch deadline.
    pub fn deadline(&self) -> Duration {
        self.inner.deadline
    }

    /// Stops the sweepers and waits for pending background writes.
    pub async fn close(&self) {
        self.inner.tasks.close().await;
        tracing::info!("bot closed");
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("router", &self.inner.router)
            .field("deadline", &self.inner.deadline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_middleware::Stage;
    use courier_test::{command, InMemoryActivityStore, InMemoryUserService, StaticHandler};

    fn builder(config: CourierConfig) -> BotBuilder {
        BotBuilder::new(config)
            .with_user_service(Arc::new(InMemoryUserService::new()))
            .with_activity_store(Arc::new(InMemoryActivityStore::new()))
    }

    #[tokio::test]
    async fn test_installs_standard_order() {
        let bot = builder(CourierConfig::default()).build().unwrap();

        let names = bot.router().chain().names();
        let expected: Vec<&str> = Stage::all().iter().map(|stage| stage.name()).collect();
        assert_eq!(names, expected);
        assert_eq!(bot.deadline(), Duration::from_secs(30));

        bot.close().await;
    }

    #[tokio::test]
    async fn test_missing_collaborators() {
        let err = BotBuilder::new(CourierConfig::default())
            .with_activity_store(Arc::new(InMemoryActivityStore::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, BotError::MissingCollaborator("user service")));

        let err = BotBuilder::new(CourierConfig::default())
            .with_user_service(Arc::new(InMemoryUserService::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, BotError::MissingCollaborator("activity store")));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = CourierConfig::default();
        config.ratelimit.max = 0;

        let err = builder(config).build().unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[tokio::test]
    async fn test_duplicate_handler_rejected() {
        let err = builder(CourierConfig::default())
            .handler(Arc::new(StaticHandler::new(&["/ping"], "a")))
            .handler(Arc::new(StaticHandler::new(&["/ping"], "b")))
            .build()
            .unwrap_err();
        assert!(matches!(err, BotError::Registration(_)));
    }

    #[tokio::test]
    async fn test_closed_tasks_rejected() {
        let tasks = BackgroundTasks::new();
        tasks.close().await;

        let err = builder(CourierConfig::default()).with_tasks(tasks).build().unwrap_err();
        assert!(matches!(err, BotError::Task(_)));
    }

    #[tokio::test]
    async fn test_help_lists_handlers() {
        let bot = builder(CourierConfig::default())
            .handler(Arc::new(StaticHandler::new(&["/ping"], "pong")))
            .with_help("Commands")
            .build()
            .unwrap();

        let prefixes: Vec<String> = bot.handlers().into_iter().flat_map(|view| view.prefixes).collect();
        assert_eq!(prefixes, ["/ping", "/help"]);

        let outcome = bot.dispatch(command("/help", 1)).await;
        assert!(outcome.is_ok());
        assert!(outcome.response.text.starts_with("*Commands*"));
        assert!(outcome.response.text.contains("/ping"));

        bot.close().await;
    }

    #[test]
    fn test_cache_policy_from_config() {
        let mut config = CourierConfig::default();
        config.cache.hit_marker = Some("(cached) ".to_string());
        config.cacheable_prefixes.remove("/user");

        let policy = BotBuilder::cache_policy(&config);
        assert_eq!(policy.ttl_for("/weather"), Some(Duration::from_secs(900)));
        assert_eq!(policy.ttl_for("/repo"), Some(Duration::from_secs(1800)));
        assert_eq!(policy.ttl_for("/user"), None);
        assert_eq!(policy.hit_marker(), Some("(cached) "));
    }
}
