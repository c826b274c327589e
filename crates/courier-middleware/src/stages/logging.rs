//! Logging middleware.
//!
//! Emits one record when a command enters the chain and one when its outcome
//! leaves it, both carrying the command id for correlation. Never
//! short-circuits.

use super::command_fields;
use crate::chain::Stage;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::Outcome;
use courier_core::{Command, DispatchContext, Logger};
use courier_telemetry::logging::fields;
use std::sync::Arc;
use tokio::time::Instant;

/// Receipt and result logging.
#[derive(Clone)]
pub struct LoggingMiddleware {
    logger: Arc<dyn Logger>,
}

impl LoggingMiddleware {
    /// Creates a logging middleware writing to `logger`.
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

impl std::fmt::Debug for LoggingMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingMiddleware").finish_non_exhaustive()
    }
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        Stage::Logging.name()
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut DispatchContext,
        cmd: Command,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let mut record = command_fields(&cmd);
            self.logger.info("command received", &record);

            let start = Instant::now();
            let outcome = next.run(ctx, cmd).await;
            let elapsed_ms = start.elapsed().as_millis();

            record.push((fields::DURATION_MS, elapsed_ms.to_string()));
            match &outcome.error {
                None => self.logger.info("command completed", &record),
                Some(error) => {
                    record.push((fields::ERROR_KIND, error.kind().to_string()));
                    record.push((fields::ERROR, error.to_string()));
                    if error.counts_as_failure() {
                        self.logger.error("command failed", &record);
                    } else {
                        self.logger.info("command rejected", &record);
                    }
                }
            }

            outcome
        })
    }
}
