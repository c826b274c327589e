//! Layered configuration loader.

use std::collections::{BTreeSet, HashMap};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::{ConfigError, CourierConfig, LogFormat};

/// Configuration loader.
///
/// Layers, later ones winning:
/// 1. Built-in defaults (or a preset)
/// 2. A TOML or JSON file or string
/// 3. Environment variables `PREFIX__SECTION__KEY`
///
/// `load()` validates the result.
///
/// # Example
///
/// ```no_run
/// use courier_config::ConfigLoader;
///
/// # fn main() -> Result<(), courier_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_dotenv()
///     .with_optional_file("courier.toml")?
///     .with_env_prefix("COURIER")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: CourierConfig,
    env_prefix: Option<String>,
    env_overrides: Option<HashMap<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from the defaults.
    pub fn new() -> Self {
        Self {
            config: CourierConfig::default(),
            env_prefix: None,
            env_overrides: None,
        }
    }

    /// Starts from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = CourierConfig::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = CourierConfig::production();
        self
    }

    /// Loads a `.toml` or `.json` file.
    ///
    /// The file replaces the current layer; fields it omits take their
    /// defaults.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        self.config = parse(&content, &format)
            .map_err(|e| match e {
                ConfigError::UnsupportedFormat(_) => {
                    ConfigError::UnsupportedFormat(path.display().to_string())
                }
                other => other,
            })?;

        Ok(self)
    }

    /// Loads a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration text in `format` (`toml` or `json`).
    ///
    /// # Example
    ///
    /// ```
    /// use courier_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[ratelimit]\nmax = 3", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.ratelimit.max, 3);
    /// assert_eq!(config.ratelimit.window_secs, 60);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Enables environment overrides under `prefix`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Uses `vars` instead of the process environment for overrides.
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_overrides = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Loads a `.env` file into the process environment if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        if let Err(error) = dotenvy::dotenv() {
            if !error.not_found() {
                tracing::warn!(error = %error, "ignoring unreadable .env file");
            }
        }
        self
    }

    /// Applies environment overrides and validates.
    pub fn load(mut self) -> Result<CourierConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars = self
                .env_overrides
                .take()
                .unwrap_or_else(|| env::vars().collect());
            let mut keys: Vec<&String> = vars.keys().filter(|k| k.starts_with(&prefix)).collect();
            keys.sort();
            for key in keys {
                self.apply_env_var(key, &vars[key], &prefix)?;
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without validating it.
    pub fn load_unvalidated(self) -> CourierConfig {
        self.config
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(path) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = path.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["CACHEABLE_PREFIXES"] => {
                config.cacheable_prefixes = parse_list(value);
            }

            ["CACHE", "DEFAULT_TTL_SECS"] => config.cache.default_ttl_secs = number(key, value)?,
            ["CACHE", "SWEEP_INTERVAL_SECS"] => {
                config.cache.sweep_interval_secs = number(key, value)?;
            }
            ["CACHE", "HIT_MARKER"] => {
                config.cache.hit_marker = (!value.is_empty()).then(|| value.to_string());
            }
            ["CACHE", "MAX_ENTRIES"] => {
                config.cache.max_entries = if value.is_empty() || value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(number(key, value)?)
                };
            }

            ["RATELIMIT", "MAX"] => config.ratelimit.max = number(key, value)?,
            ["RATELIMIT", "WINDOW_SECS"] => config.ratelimit.window_secs = number(key, value)?,
            ["RATELIMIT", "CLEANUP_INTERVAL_SECS"] => {
                config.ratelimit.cleanup_interval_secs = number(key, value)?;
            }

            ["VALIDATION", "MAX_LENGTH"] => config.validation.max_length = number(key, value)?,
            ["METRICS", "SLOW_THRESHOLD_MS"] => {
                config.metrics.slow_threshold_ms = number(key, value)?;
            }
            ["DISPATCH", "DEADLINE_SECS"] => config.dispatch.deadline_secs = number(key, value)?,

            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }

            // Per-prefix TTLs cannot be expressed in a variable name.
            _ => {}
        }

        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<CourierConfig, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected a non-negative integer"))
}

fn parse_list(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
