//! Standard middleware stages.
//!
//! Listed outermost first, the order `courier::Bot` installs them in:
//!
//! 1. [`logging`] - receipt and result records
//! 2. [`metrics`] - counters, timings, slow warnings
//! 3. [`validation`] - sanitizing and per-command argument checks
//! 4. [`caching`] - per-user response cache
//! 5. [`auth`] - user lookup and registration
//! 6. [`activity`] - background activity recording
//! 7. [`rate_limit`] - per-user sliding window

pub mod activity;
pub mod auth;
pub mod caching;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod validation;

pub use activity::ActivityMiddleware;
pub use auth::AuthMiddleware;
pub use caching::{CacheKey, CachePolicy, CachingMiddleware, ResponseCache};
pub use logging::LoggingMiddleware;
pub use metrics::{CommandSet, MetricsMiddleware};
pub use rate_limit::{RateLimitConfig, RateLimitMiddleware};
pub use validation::{sanitize, ValidationMiddleware, Validator};

use courier_core::Command;
use courier_telemetry::logging::fields;

/// Standard log fields identifying a command.
pub(crate) fn command_fields(cmd: &Command) -> Vec<(&'static str, String)> {
    vec![
        (fields::COMMAND_ID, cmd.id.to_string()),
        (fields::USER_ID, cmd.user.id.to_string()),
        (fields::CHAT_ID, cmd.chat.id.to_string()),
        (fields::PREFIX, cmd.head().unwrap_or_default().to_string()),
    ]
}
