//! Root configuration type.

use crate::{
    CacheSection, ConfigError, DispatchSection, LogFormat, LoggingSection, MetricsSection,
    RateLimitSection, ValidationSection,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Complete Courier configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and the
/// environment.
///
/// # Example
///
/// ```
/// use courier_config::CourierConfig;
///
/// let config = CourierConfig::default();
/// assert_eq!(config.ratelimit.max, 10);
/// assert!(config.cacheable_prefixes.contains("/weather"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Command tokens whose responses may be cached.
    #[serde(default = "default_cacheable_prefixes")]
    pub cacheable_prefixes: BTreeSet<String>,

    /// Response cache.
    #[serde(default)]
    pub cache: CacheSection,

    /// Rate limiter.
    #[serde(default)]
    pub ratelimit: RateLimitSection,

    /// Input validation.
    #[serde(default)]
    pub validation: ValidationSection,

    /// Metrics.
    #[serde(default)]
    pub metrics: MetricsSection,

    /// Dispatch.
    #[serde(default)]
    pub dispatch: DispatchSection,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            cacheable_prefixes: default_cacheable_prefixes(),
            cache: CacheSection::default(),
            ratelimit: RateLimitSection::default(),
            validation: ValidationSection::default(),
            metrics: MetricsSection::default(),
            dispatch: DispatchSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

fn default_cacheable_prefixes() -> BTreeSet<String> {
    ["/weather", "/repo", "/user"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl CourierConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field:
    /// a zero TTL, interval, limit, length or deadline, a prefix that does
    /// not start with `/`, or an unknown log level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for prefix in &self.cacheable_prefixes {
            check_prefix("cacheable_prefixes", prefix)?;
        }

        non_zero("cache.default_ttl_secs", self.cache.default_ttl_secs)?;
        non_zero("cache.sweep_interval_secs", self.cache.sweep_interval_secs)?;
        for (prefix, ttl) in &self.cache.per_prefix_ttl_secs {
            check_prefix("cache.per_prefix_ttl_secs", prefix)?;
            non_zero(&format!("cache.per_prefix_ttl_secs.{prefix}"), *ttl)?;
        }
        if self.cache.max_entries == Some(0) {
            return Err(ConfigError::invalid_value(
                "cache.max_entries",
                "must be greater than zero when set",
            ));
        }

        non_zero("ratelimit.max", u64::from(self.ratelimit.max))?;
        non_zero("ratelimit.window_secs", self.ratelimit.window_secs)?;
        non_zero("ratelimit.cleanup_interval_secs", self.ratelimit.cleanup_interval_secs)?;

        if self.validation.max_length == 0 {
            return Err(ConfigError::invalid_value(
                "validation.max_length",
                "must be greater than zero",
            ));
        }

        non_zero("dispatch.deadline_secs", self.dispatch.deadline_secs)?;

        check_log_level(&self.logging.level)
    }

    /// Development preset: debug level, pretty output.
    ///
    /// # Example
    ///
    /// ```
    /// use courier_config::{CourierConfig, LogFormat};
    ///
    /// let config = CourierConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// assert_eq!(config.logging.format, LogFormat::Pretty);
    /// ```
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.metrics.slow_threshold_ms = 500;
        config
    }

    /// Production preset: info level, JSON output.
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config
    }
}

fn non_zero(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid_value(field, "must be greater than zero"));
    }
    Ok(())
}

fn check_prefix(field: &str, prefix: &str) -> Result<(), ConfigError> {
    if prefix.len() < 2 || !prefix.starts_with('/') || prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::invalid_value(
            field,
            format!("{prefix:?} is not a command prefix"),
        ));
    }
    Ok(())
}

/// Accepts a bare level, or a directive list whose every part is
/// `target=level` or a bare level.
fn check_log_level(level: &str) -> Result<(), ConfigError> {
    let known = |l: &str| LOG_LEVELS.contains(&l.trim().to_lowercase().as_str());

    let valid = !level.trim().is_empty()
        && level.split(',').all(|directive| match directive.split_once('=') {
            Some((target, l)) => !target.trim().is_empty() && known(l),
            None => known(directive),
        });

    if !valid {
        return Err(ConfigError::invalid_value(
            "logging.level",
            format!("unknown log level {level:?}"),
        ));
    }

    courier_telemetry::logging::create_env_filter(level)
        .map(|_| ())
        .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = CourierConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatch.deadline_secs, 30);
        assert_eq!(config.validation.max_length, 500);
        assert_eq!(config.metrics.slow_threshold_ms, 2000);
    }

    #[test]
    fn test_presets() {
        assert!(CourierConfig::development().validate().is_ok());
        let production = CourierConfig::production();
        assert_eq!(production.logging.format, LogFormat::Json);
        assert!(production.validate().is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let cases: Vec<(&str, Box<dyn Fn(&mut CourierConfig)>)> = vec![
            ("cache.default_ttl_secs", Box::new(|c| c.cache.default_ttl_secs = 0)),
            ("ratelimit.max", Box::new(|c| c.ratelimit.max = 0)),
            ("ratelimit.window_secs", Box::new(|c| c.ratelimit.window_secs = 0)),
            ("validation.max_length", Box::new(|c| c.validation.max_length = 0)),
            (
                "cache.per_prefix_ttl_secs./repo",
                Box::new(|c| {
                    c.cache.per_prefix_ttl_secs.insert("/repo".to_string(), 0);
                }),
            ),
        ];

        for (field, mutate) in cases {
            let mut config = CourierConfig::default();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(field), "{field}: {err}");
        }
    }

    #[test]
    fn test_prefix_must_start_with_slash() {
        let mut config = CourierConfig::default();
        config.cacheable_prefixes.insert("weather".to_string());
        assert!(config.validate().unwrap_err().to_string().contains("cacheable_prefixes"));
    }

    #[test]
    fn test_log_levels() {
        assert!(check_log_level("info").is_ok());
        assert!(check_log_level("WARN").is_ok());
        assert!(check_log_level("courier=debug,warn").is_ok());
        assert!(check_log_level("verbose").is_err());
        assert!(check_log_level("courier=loud").is_err());
        assert!(check_log_level("").is_err());
    }

    #[test]
    fn test_toml_round_trip_shape() {
        let text = toml::to_string_pretty(&CourierConfig::default()).unwrap();
        assert!(text.contains("[ratelimit]"));
        assert!(text.contains("cacheable_prefixes"));
    }
}
