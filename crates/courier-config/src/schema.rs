//! Configuration sections.
//!
//! Every section rejects unknown fields and fills missing ones with their
//! defaults, so a file only needs to mention what it changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Response cache settings.
///
/// # Example
///
/// ```
/// use courier_config::CacheSection;
/// use std::time::Duration;
///
/// let cache = CacheSection::default();
/// assert_eq!(cache.ttl_for("/weather"), Duration::from_secs(900));
/// assert_eq!(cache.ttl_for("/news"), Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    /// TTL for cacheable prefixes without their own entry.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Per-prefix TTL overrides.
    #[serde(default = "default_per_prefix_ttl")]
    pub per_prefix_ttl_secs: BTreeMap<String, u64>,

    /// How often expired entries are swept.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Text prepended to responses served from cache.
    #[serde(default)]
    pub hit_marker: Option<String>,

    /// Upper bound on stored entries. Unbounded when unset.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            per_prefix_ttl_secs: default_per_prefix_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            hit_marker: None,
            max_entries: None,
        }
    }
}

impl CacheSection {
    /// Returns the baseline TTL.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Returns the TTL for `prefix`: its override, else the baseline.
    pub fn ttl_for(&self, prefix: &str) -> Duration {
        self.per_prefix_ttl_secs
            .get(prefix)
            .map_or_else(|| self.default_ttl(), |secs| Duration::from_secs(*secs))
    }

    /// Returns the sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_ttl_secs() -> u64 {
    600
}

fn default_per_prefix_ttl() -> BTreeMap<String, u64> {
    BTreeMap::from([
        ("/weather".to_string(), 900),
        ("/repo".to_string(), 1800),
        ("/user".to_string(), 1800),
    ])
}

fn default_sweep_interval() -> u64 {
    300
}

/// Rate limiter settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSection {
    /// Commands allowed per window and user.
    #[serde(default = "default_max")]
    pub max: u32,

    /// Window length in seconds.
    #[serde(default = "default_window")]
    pub window_secs: u64,

    /// How often idle users are dropped, in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            max: default_max(),
            window_secs: default_window(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

impl RateLimitSection {
    /// Returns the window.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Returns the cleanup interval.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

fn default_max() -> u32 {
    10
}

fn default_window() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    600
}

/// Input validation settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ValidationSection {
    /// Maximum sanitized command length in bytes.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
        }
    }
}

fn default_max_length() -> usize {
    500
}

/// Metrics settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Dispatches slower than this are logged as warnings.
    #[serde(default = "default_slow_threshold")]
    pub slow_threshold_ms: u64,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            slow_threshold_ms: default_slow_threshold(),
        }
    }
}

impl MetricsSection {
    /// Returns the slow threshold.
    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_threshold_ms)
    }
}

fn default_slow_threshold() -> u64 {
    2000
}

/// Dispatch settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DispatchSection {
    /// Per-dispatch deadline in seconds.
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline(),
        }
    }
}

impl DispatchSection {
    /// Returns the deadline.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

fn default_deadline() -> u64 {
    30
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines.
    #[default]
    Json,
    /// Human-readable.
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Level or filter directive, e.g. `info` or `courier=debug,warn`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingSection {
    /// Converts to the telemetry crate's logging setup.
    pub fn to_log_config(&self) -> courier_telemetry::LogConfig {
        let mut config = match self.format {
            LogFormat::Json => courier_telemetry::LogConfig::production(),
            LogFormat::Pretty => courier_telemetry::LogConfig::development(),
        };
        config.level = self.level.clone();
        config
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
