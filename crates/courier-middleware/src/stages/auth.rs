//! Auth middleware.
//!
//! Resolves the sender against the user service, registering first-time
//! users, and attaches the authoritative [`UserRecord`] to the context.
//! Inner stages and handlers read the user from the context, not from the
//! command's snapshot.
//!
//! Any service failure, for lookup as much as for registration, stops the
//! dispatch with the registration-failure reply.

use super::command_fields;
use crate::chain::Stage;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::Outcome;
use courier_core::{
    replies, Command, DispatchContext, DispatchError, Logger, Registration, Response,
    ServiceError, UserRecord, UserService,
};
use courier_tasks::BackgroundTasks;
use courier_telemetry::logging::fields;
use std::sync::Arc;

/// User resolution and registration.
#[derive(Clone)]
pub struct AuthMiddleware {
    users: Arc<dyn UserService>,
    tasks: BackgroundTasks,
    logger: Arc<dyn Logger>,
}

impl AuthMiddleware {
    /// Creates an auth middleware.
    ///
    /// `tasks` runs the best-effort `touch` for returning users.
    pub fn new(users: Arc<dyn UserService>, tasks: BackgroundTasks, logger: Arc<dyn Logger>) -> Self {
        Self {
            users,
            tasks,
            logger,
        }
    }

    async fn resolve(&self, ctx: &DispatchContext, cmd: &Command) -> Result<UserRecord, ServiceError> {
        let id = cmd.user.id;

        ctx.check_deadline()
            .map_err(|_| ServiceError::DeadlineExceeded)?;
        let existing = ctx
            .run_until_deadline(self.users.get(id))
            .await
            .map_err(|_| ServiceError::DeadlineExceeded)??;

        if let Some(user) = existing {
            self.touch_in_background(id);
            return Ok(user);
        }

        ctx.check_deadline()
            .map_err(|_| ServiceError::DeadlineExceeded)?;
        let user = ctx
            .run_until_deadline(self.users.register(Registration::from(&cmd.user)))
            .await
            .map_err(|_| ServiceError::DeadlineExceeded)??;

        let mut record = command_fields(cmd);
        record.push(("language", user.language.clone()));
        self.logger.info("user registered", &record);
        Ok(user)
    }

    fn touch_in_background(&self, id: i64) {
        let users = self.users.clone();
        let logger = self.logger.clone();
        let spawned = self.tasks.spawn("user-touch", async move {
            if let Err(error) = users.touch(id).await {
                logger.debug(
                    "user touch failed",
                    &[(fields::USER_ID, id.to_string()), (fields::ERROR, error.to_string())],
                );
            }
        });
        if let Err(error) = spawned {
            tracing::debug!(user_id = id, error = %error, "user touch not scheduled");
        }
    }
}

impl std::fmt::Debug for AuthMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMiddleware").finish_non_exhaustive()
    }
}

impl Middleware for AuthMiddleware {
    fn name(&self) -> &'static str {
        Stage::Auth.name()
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut DispatchContext,
        cmd: Command,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            match self.resolve(ctx, &cmd).await {
                Ok(user) => {
                    ctx.set_user(user);
                    next.run(ctx, cmd).await
                }
                Err(error) => {
                    let mut record = command_fields(&cmd);
                    record.push((fields::ERROR, error.to_string()));
                    self.logger.error("user registration failed", &record);

                    Outcome::failed(
                        Response::plain(replies::REGISTRATION_FAILED),
                        DispatchError::not_registered(
                            format!("user {} could not be resolved", cmd.user.id),
                            Some(error),
                        ),
                    )
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Endpoint;
    use crate::Chain;
    use courier_core::{ErrorKind, Level};
    use courier_test::{command, CommandBuilder, InMemoryUserService, RecordingLogger};
    use std::time::Duration;

    /// Replies with the language of the context user.
    struct WhoAmI;

    impl Endpoint for WhoAmI {
        fn call<'a>(&'a self, ctx: &'a mut DispatchContext, _cmd: Command) -> BoxFuture<'a, Outcome> {
            let language = ctx.user().map(|u| u.language.clone()).unwrap_or_default();
            Box::pin(async move { Outcome::ok(Response::plain(format!("lang={language}"))) })
        }
    }

    struct Setup {
        chain: Chain,
        users: Arc<InMemoryUserService>,
        logger: Arc<RecordingLogger>,
        tasks: BackgroundTasks,
    }

    fn setup(users: InMemoryUserService) -> Setup {
        let users = Arc::new(users);
        let logger = Arc::new(RecordingLogger::new());
        let tasks = BackgroundTasks::new();
        let chain = Chain::builder()
            .push(AuthMiddleware::new(users.clone(), tasks.clone(), logger.clone()))
            .build();
        Setup {
            chain,
            users,
            logger,
            tasks,
        }
    }

    #[tokio::test]
    async fn test_registers_new_user() {
        let s = setup(InMemoryUserService::new().with_default_language("uz"));
        let mut ctx = DispatchContext::new();

        let outcome = s.chain.run(&mut ctx, command("/start", 42), &WhoAmI).await;

        assert_eq!(outcome.response.text, "lang=uz");
        assert_eq!(s.users.register_calls(), 1);
        assert!(s.users.user(42).is_some());
        assert_eq!(ctx.user().map(|u| u.id), Some(42));
        assert!(s.logger.contains(Level::Info, "user registered"));
    }

    #[tokio::test]
    async fn test_registration_keeps_command_language() {
        let s = setup(InMemoryUserService::new());
        let cmd = CommandBuilder::new("/start").user_id(5).language("de").build();
        let mut ctx = DispatchContext::new();

        let outcome = s.chain.run(&mut ctx, cmd, &WhoAmI).await;
        assert_eq!(outcome.response.text, "lang=de");
    }

    #[tokio::test]
    async fn test_existing_user_is_touched() {
        let s = setup(InMemoryUserService::new());
        s.users.insert(InMemoryUserService::record(9, "en"));
        let mut ctx = DispatchContext::new();

        let outcome = s.chain.run(&mut ctx, command("/stats", 9), &WhoAmI).await;
        assert_eq!(outcome.response.text, "lang=en");
        assert_eq!(s.users.register_calls(), 0);

        s.tasks.close().await;
        assert_eq!(s.users.touch_calls(), 1);
    }

    #[tokio::test]
    async fn test_registration_failure_stops_chain() {
        let s = setup(InMemoryUserService::new().failing_register());
        let mut ctx = DispatchContext::new();

        let outcome = s.chain.run(&mut ctx, command("/start", 1), &WhoAmI).await;

        assert_eq!(outcome.response.text, replies::REGISTRATION_FAILED);
        assert_eq!(outcome.error_kind(), Some(ErrorKind::NotRegistered));
        assert!(ctx.user().is_none());
        assert!(s.logger.contains(Level::Error, "user registration failed"));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_not_registered() {
        let s = setup(InMemoryUserService::new().failing_get());
        let mut ctx = DispatchContext::new();

        let outcome = s.chain.run(&mut ctx, command("/start", 1), &WhoAmI).await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::NotRegistered));
        assert_eq!(s.users.register_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_skips_service() {
        let s = setup(InMemoryUserService::new());
        let mut ctx = DispatchContext::new().with_timeout(Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(20)).await;

        let outcome = s.chain.run(&mut ctx, command("/start", 1), &WhoAmI).await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::NotRegistered));
        assert_eq!(s.users.get_calls(), 0);
        assert_eq!(s.users.register_calls(), 0);
    }
}
