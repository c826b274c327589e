//! Activity-log middleware.
//!
//! Records every successful command in the activity store. The write runs as
//! a tracked background task, so it never delays the reply, and a failed
//! write is logged and dropped.

use crate::chain::Stage;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::Outcome;
use chrono::Utc;
use courier_core::{ActivityStore, Command, DispatchContext, Logger};
use courier_tasks::BackgroundTasks;
use courier_telemetry::logging::fields;
use std::sync::Arc;

/// Background activity recording.
#[derive(Clone)]
pub struct ActivityMiddleware {
    store: Arc<dyn ActivityStore>,
    tasks: BackgroundTasks,
    logger: Arc<dyn Logger>,
}

impl ActivityMiddleware {
    /// Creates an activity middleware writing to `store` on `tasks`.
    pub fn new(store: Arc<dyn ActivityStore>, tasks: BackgroundTasks, logger: Arc<dyn Logger>) -> Self {
        Self {
            store,
            tasks,
            logger,
        }
    }

    fn record(&self, user_id: i64, text: String) {
        let store = self.store.clone();
        let logger = self.logger.clone();
        let at = Utc::now();

        let spawned = self.tasks.spawn("activity-log", async move {
            if let Err(error) = store.log(user_id, &text, at).await {
                logger.warn(
                    "activity log failed",
                    &[(fields::USER_ID, user_id.to_string()), (fields::ERROR, error.to_string())],
                );
            }
        });

        if let Err(error) = spawned {
            self.logger.warn(
                "activity log not scheduled",
                &[(fields::USER_ID, user_id.to_string()), (fields::ERROR, error.to_string())],
            );
        }
    }
}

impl std::fmt::Debug for ActivityMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityMiddleware").finish_non_exhaustive()
    }
}

impl Middleware for ActivityMiddleware {
    fn name(&self) -> &'static str {
        Stage::Activity.name()
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut DispatchContext,
        cmd: Command,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let user_id = ctx.user().map_or(cmd.user.id, |user| user.id);
            let text = cmd.text.clone();

            let outcome = next.run(ctx, cmd).await;
            if outcome.is_ok() {
                self.record(user_id, text);
            }
            outcome
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Endpoint;
    use crate::Chain;
    use courier_core::{DispatchError, Level, Response};
    use courier_test::{command, InMemoryActivityStore, RecordingLogger};
    use std::time::Duration;

    struct Reply {
        fail: bool,
    }

    impl Endpoint for Reply {
        fn call<'a>(&'a self, _ctx: &'a mut DispatchContext, _cmd: Command) -> BoxFuture<'a, Outcome> {
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Outcome::failed(Response::plain("no"), DispatchError::handler(std::io::Error::other("x")))
                } else {
                    Outcome::ok(Response::plain("yes"))
                }
            })
        }
    }

    fn chain(store: &Arc<InMemoryActivityStore>, tasks: &BackgroundTasks, logger: &Arc<RecordingLogger>) -> Chain {
        Chain::builder()
            .push(ActivityMiddleware::new(store.clone(), tasks.clone(), logger.clone()))
            .build()
    }

    #[tokio::test]
    async fn test_successful_command_is_logged() {
        let store = Arc::new(InMemoryActivityStore::new());
        let tasks = BackgroundTasks::new();
        let logger = Arc::new(RecordingLogger::new());

        let mut ctx = DispatchContext::new();
        chain(&store, &tasks, &logger)
            .run(&mut ctx, command("/weather Paris", 42), &Reply { fail: false })
            .await;

        store.wait_for(1, Duration::from_secs(1)).await;
        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, 42);
        assert_eq!(entries[0].command, "/weather Paris");
    }

    #[tokio::test]
    async fn test_failed_command_is_not_logged() {
        let store = Arc::new(InMemoryActivityStore::new());
        let tasks = BackgroundTasks::new();
        let logger = Arc::new(RecordingLogger::new());

        let mut ctx = DispatchContext::new();
        chain(&store, &tasks, &logger)
            .run(&mut ctx, command("/weather Paris", 42), &Reply { fail: true })
            .await;

        tasks.close().await;
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_warned() {
        let store = Arc::new(InMemoryActivityStore::new().failing());
        let tasks = BackgroundTasks::new();
        let logger = Arc::new(RecordingLogger::new());

        let mut ctx = DispatchContext::new();
        let outcome = chain(&store, &tasks, &logger)
            .run(&mut ctx, command("/ping", 1), &Reply { fail: false })
            .await;
        assert!(outcome.is_ok());

        tasks.close().await;
        assert!(logger.contains(Level::Warn, "activity log failed"));
    }

    #[tokio::test]
    async fn test_closed_tasks_warns() {
        let store = Arc::new(InMemoryActivityStore::new());
        let tasks = BackgroundTasks::new();
        let logger = Arc::new(RecordingLogger::new());
        tasks.close().await;

        let mut ctx = DispatchContext::new();
        chain(&store, &tasks, &logger)
            .run(&mut ctx, command("/ping", 1), &Reply { fail: false })
            .await;

        assert!(logger.contains(Level::Warn, "activity log not scheduled"));
        assert!(store.entries().is_empty());
    }
}
