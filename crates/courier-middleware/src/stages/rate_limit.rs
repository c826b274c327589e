//! Rate limiting middleware.
//!
//! Per-user sliding window: a user may dispatch at most `max_requests`
//! commands within any `window`. Each user owns an ordered queue of request
//! instants behind its own lock, so users never contend with each other
//! after their first request.
//!
//! ## Algorithm
//!
//! 1. Get or create the user's queue.
//! 2. Drop instants at or before `now - window`.
//! 3. If `max_requests` remain, reply with the throttling text and do not
//!    record the attempt.
//! 4. Otherwise record `now` and continue.
//!
//! A housekeeper registered on [`BackgroundTasks`] drops users idle for
//! longer than twice the window.
//!
//! ## Example
//!
//! ```ignore
//! use courier_middleware::stages::{RateLimitConfig, RateLimitMiddleware};
//! use std::time::Duration;
//!
//! let rate_limit = RateLimitMiddleware::new(
//!     RateLimitConfig::default()
//!         .with_max_requests(3)
//!         .with_window(Duration::from_secs(60)),
//! );
//! rate_limit.spawn_housekeeper(&tasks)?;
//! ```

use crate::chain::Stage;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::Outcome;
use courier_core::{replies, Command, DispatchContext, DispatchError, Response};
use courier_tasks::{BackgroundTasks, TaskResult};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Configuration for the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Commands allowed per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
    /// How often idle users are dropped.
    pub cleanup_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(600),
        }
    }
}

impl RateLimitConfig {
    /// Sets the number of commands allowed per window.
    #[must_use]
    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    /// Sets the window length.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Sets the housekeeping interval.
    #[must_use]
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

type Window = Arc<Mutex<VecDeque<Instant>>>;

#[derive(Debug, Default)]
struct RateLimitStore {
    users: RwLock<HashMap<i64, Window>>,
}

impl RateLimitStore {
    fn window_for(&self, user_id: i64) -> Window {
        if let Some(window) = self.users.read().get(&user_id) {
            return window.clone();
        }
        self.users.write().entry(user_id).or_default().clone()
    }

    fn cleanup(&self, now: Instant, max_idle: Duration) -> usize {
        let mut users = self.users.write();
        let before = users.len();
        users.retain(|_, window| {
            window
                .lock()
                .back()
                .is_some_and(|newest| now.saturating_duration_since(*newest) <= max_idle)
        });
        before - users.len()
    }
}

/// Per-user sliding-window rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitMiddleware {
    config: RateLimitConfig,
    store: Arc<RateLimitStore>,
}

impl RateLimitMiddleware {
    /// Creates a rate limiter.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            store: Arc::new(RateLimitStore::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admits or refuses one command from `user_id` at `now`.
    ///
    /// On refusal returns how long until the oldest recorded command leaves
    /// the window.
    pub fn check(&self, user_id: i64, now: Instant) -> Result<(), Duration> {
        let window = self.store.window_for(user_id);
        let mut stamps = window.lock();

        if let Some(cutoff) = now.checked_sub(self.config.window) {
            while stamps.front().is_some_and(|oldest| *oldest <= cutoff) {
                stamps.pop_front();
            }
        }

        if stamps.len() >= self.config.max_requests as usize {
            let retry_after = stamps.front().map_or(self.config.window, |oldest| {
                (*oldest + self.config.window).saturating_duration_since(now)
            });
            return Err(retry_after);
        }

        stamps.push_back(now);
        Ok(())
    }

    /// Drops users whose newest command is older than twice the window.
    ///
    /// Returns the number of users removed.
    pub fn cleanup(&self) -> usize {
        self.store.cleanup(Instant::now(), self.config.window * 2)
    }

    /// Returns the number of users currently tracked.
    pub fn tracked_users(&self) -> usize {
        self.store.users.read().len()
    }

    /// Registers the periodic housekeeper on `tasks`.
    ///
    /// The housekeeper holds a weak reference and stops when `tasks` closes.
    pub fn spawn_housekeeper(&self, tasks: &BackgroundTasks) -> TaskResult<()> {
        let store = Arc::downgrade(&self.store);
        let max_idle = self.config.window * 2;

        tasks.spawn_periodic("rate-limit-cleanup", self.config.cleanup_interval, move || {
            let store = store.clone();
            async move {
                if let Some(store) = store.upgrade() {
                    let removed = store.cleanup(Instant::now(), max_idle);
                    if removed > 0 {
                        tracing::debug!(removed, "dropped idle rate-limit entries");
                    }
                }
            }
        })?;
        Ok(())
    }
}

/// Rounds up to whole seconds, at least one.
fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &'static str {
        Stage::RateLimit.name()
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut DispatchContext,
        cmd: Command,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            match self.check(cmd.user.id, Instant::now()) {
                Ok(()) => next.run(ctx, cmd).await,
                Err(retry_after) => {
                    tracing::debug!(
                        command_id = %cmd.id,
                        user_id = cmd.user.id,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "command throttled"
                    );
                    Outcome::failed(
                        Response::plain(replies::throttled(whole_seconds(retry_after))),
                        DispatchError::throttled(retry_after),
                    )
                }
            }
        })
    }
}
