//! Metrics middleware.
//!
//! Times every dispatch and records it in a shared [`MetricsRegistry`].
//! Dispatches slower than the threshold are reported through the logger.
//!
//! Only tokens in the configured [`CommandSet`] get their own bucket. Every
//! other token, including text rejected or throttled before any handler
//! saw it, is recorded under the shared unknown bucket, so the per-command
//! map is bounded by the registered commands.

use crate::chain::Stage;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::Outcome;
use courier_core::{Command, DispatchContext, Logger};
use courier_telemetry::logging::fields;
use courier_telemetry::{MetricsRegistry, UNKNOWN_COMMAND};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default slow-dispatch threshold.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_secs(2);

/// Command tokens that are recorded under their own name.
pub trait CommandSet: Send + Sync + 'static {
    /// Returns true if `token` names a registered command.
    fn contains(&self, token: &str) -> bool;
}

impl CommandSet for HashSet<String> {
    fn contains(&self, token: &str) -> bool {
        HashSet::contains(self, token)
    }
}

impl CommandSet for BTreeSet<String> {
    fn contains(&self, token: &str) -> bool {
        BTreeSet::contains(self, token)
    }
}

/// Dispatch counting and timing.
#[derive(Clone)]
pub struct MetricsMiddleware {
    registry: Arc<MetricsRegistry>,
    logger: Arc<dyn Logger>,
    commands: Arc<dyn CommandSet>,
    slow_threshold: Duration,
}

impl MetricsMiddleware {
    /// Creates a metrics middleware with the default slow threshold.
    ///
    /// Until [`with_commands`](Self::with_commands) is called every dispatch
    /// lands in the unknown bucket.
    pub fn new(registry: Arc<MetricsRegistry>, logger: Arc<dyn Logger>) -> Self {
        Self {
            registry,
            logger,
            commands: Arc::new(HashSet::<String>::new()),
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
        }
    }

    /// Sets the tokens that get their own per-command bucket.
    #[must_use]
    pub fn with_commands(mut self, commands: Arc<dyn CommandSet>) -> Self {
        self.commands = commands;
        self
    }

    /// Sets the duration above which a dispatch is reported as slow.
    #[must_use]
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Returns the registry this middleware records into.
    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for MetricsMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsMiddleware")
            .field("slow_threshold", &self.slow_threshold)
            .finish_non_exhaustive()
    }
}

/// Per-command bucket: a registered token, or the shared unknown bucket.
fn bucket<'c>(head: Option<&'c str>, commands: &dyn CommandSet) -> &'c str {
    match head {
        Some(head) if commands.contains(head) => head,
        _ => UNKNOWN_COMMAND,
    }
}

impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        Stage::Metrics.name()
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut DispatchContext,
        cmd: Command,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let head = cmd.head().map(str::to_string);
            let user_id = cmd.user.id;

            let start = Instant::now();
            let outcome = next.run(ctx, cmd).await;
            let elapsed = start.elapsed();

            let prefix = bucket(head.as_deref(), self.commands.as_ref());
            self.registry
                .record(prefix, elapsed, outcome.counts_as_failure());

            if elapsed > self.slow_threshold {
                self.logger.warn(
                    "slow command",
                    &[
                        (fields::PREFIX, prefix.to_string()),
                        (fields::USER_ID, user_id.to_string()),
                        (fields::DURATION_MS, elapsed.as_millis().to_string()),
                    ],
                );
            }

            outcome
        })
    }
}
