//! Response caching middleware.
//!
//! Serves repeated read-only commands from a [`TtlCache`]. Only tokens on the
//! policy's allow-list are cached, and the key always includes the user id so
//! personalized replies never leak between users.

use crate::chain::Stage;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::Outcome;
use courier_cache::TtlCache;
use courier_core::{Command, DispatchContext, Response};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Cache key: the sender and the sanitized command text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// External user id.
    pub user_id: i64,
    /// Sanitized command text.
    pub text: String,
}

impl CacheKey {
    /// Builds the key for `cmd`.
    pub fn for_command(cmd: &Command) -> Self {
        Self {
            user_id: cmd.user.id,
            text: cmd.text.clone(),
        }
    }
}

/// The cache type the caching middleware reads and writes.
pub type ResponseCache = TtlCache<CacheKey, Response>;

/// Which commands are cached, and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    ttls: HashMap<String, Duration>,
    default_ttl: Duration,
    hit_marker: Option<String>,
}

impl CachePolicy {
    /// A policy that caches nothing until prefixes are added.
    pub fn empty(default_ttl: Duration) -> Self {
        Self {
            ttls: HashMap::new(),
            default_ttl,
            hit_marker: None,
        }
    }

    /// Marks `prefix` cacheable with its own TTL.
    #[must_use]
    pub fn cacheable_for(mut self, prefix: impl Into<String>, ttl: Duration) -> Self {
        self.ttls.insert(prefix.into(), ttl);
        self
    }

    /// Marks `prefix` cacheable with the default TTL.
    #[must_use]
    pub fn cacheable(self, prefix: impl Into<String>) -> Self {
        let ttl = self.default_ttl;
        self.cacheable_for(prefix, ttl)
    }

    /// Sets the text prepended to responses served from cache.
    #[must_use]
    pub fn with_hit_marker(mut self, marker: impl Into<String>) -> Self {
        self.hit_marker = Some(marker.into());
        self
    }

    /// Returns the TTL for `prefix`, or `None` if it is not cacheable.
    pub fn ttl_for(&self, prefix: &str) -> Option<Duration> {
        self.ttls.get(prefix).copied()
    }

    /// Returns the baseline TTL.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns the hit marker, if one is set.
    pub fn hit_marker(&self) -> Option<&str> {
        self.hit_marker.as_deref()
    }
}

impl Default for CachePolicy {
    /// `/weather` for 15 minutes, `/repo` and `/user` for 30, no marker.
    fn default() -> Self {
        Self::empty(Duration::from_secs(600))
            .cacheable_for("/weather", Duration::from_secs(900))
            .cacheable_for("/repo", Duration::from_secs(1800))
            .cacheable_for("/user", Duration::from_secs(1800))
    }
}

/// Per-user response cache.
#[derive(Clone)]
pub struct CachingMiddleware {
    cache: Arc<ResponseCache>,
    policy: CachePolicy,
}

impl CachingMiddleware {
    /// Creates a caching middleware over `cache`.
    pub fn new(cache: Arc<ResponseCache>, policy: CachePolicy) -> Self {
        Self { cache, policy }
    }

    /// Returns the backing cache.
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Returns the policy.
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }
}

impl std::fmt::Debug for CachingMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingMiddleware")
            .field("policy", &self.policy)
            .field("entries", &self.cache.size())
            .finish()
    }
}

impl Middleware for CachingMiddleware {
    fn name(&self) -> &'static str {
        Stage::Caching.name()
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut DispatchContext,
        cmd: Command,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let Some(ttl) = cmd.head().and_then(|head| self.policy.ttl_for(head)) else {
                return next.run(ctx, cmd).await;
            };

            let key = CacheKey::for_command(&cmd);
            if let Some(cached) = self.cache.get(&key) {
                tracing::debug!(command_id = %cmd.id, user_id = key.user_id, "cache hit");
                let response = match self.policy.hit_marker() {
                    Some(marker) => cached.with_prefix(marker),
                    None => cached,
                };
                return Outcome::ok(response);
            }

            let outcome = next.run(ctx, cmd).await;
            if outcome.is_ok() && !outcome.response.is_empty() {
                self.cache.set_with_ttl(key, outcome.response.clone(), ttl);
            }
            outcome
        })
    }
}
