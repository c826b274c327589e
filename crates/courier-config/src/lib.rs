//! Typed configuration for Courier.
//!
//! - TOML and JSON files
//! - Environment overrides `COURIER__SECTION__KEY`, optionally from `.env`
//! - Strict parsing: unknown fields are errors
//! - Layered loading: defaults, then file, then environment, then validation
//!
//! # Configuration File Format
//!
//! ```toml
//! cacheable_prefixes = ["/weather", "/repo", "/user"]
//!
//! [cache]
//! default_ttl_secs = 600
//! sweep_interval_secs = 300
//! hit_marker = "(cached) "
//!
//! [cache.per_prefix_ttl_secs]
//! "/weather" = 900
//! "/repo" = 1800
//!
//! [ratelimit]
//! max = 10
//! window_secs = 60
//! cleanup_interval_secs = 600
//!
//! [validation]
//! max_length = 500
//!
//! [metrics]
//! slow_threshold_ms = 2000
//!
//! [dispatch]
//! deadline_secs = 30
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `COURIER__RATELIMIT__MAX=5`
//! - `COURIER__CACHE__HIT_MARKER=(cached) `
//! - `COURIER__CACHEABLE_PREFIXES=/weather,/repo`
//! - `COURIER__LOGGING__FORMAT=pretty`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::CourierConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    CacheSection, DispatchSection, LogFormat, LoggingSection, MetricsSection, RateLimitSection,
    ValidationSection,
};
