//! Logger collaborator.
//!
//! Middleware logs through the structured [`Logger`] trait so tests can
//! capture records and embedding programs can route them anywhere. The
//! default, [`TracingLogger`], forwards to `tracing`.
//!
//! Some collaborators (API clients, stores) only want a printf-style sink.
//! They take a [`PrintfLogger`], and [`LoggerAdapter`] bridges any structured
//! logger to it. The printf interface stays at the edges; middleware never
//! sees it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Diagnostic detail.
    Debug,
    /// Normal operation.
    Info,
    /// Something degraded but handled.
    Warn,
    /// Something failed.
    Error,
}

impl Level {
    /// Returns the upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key/value pairs attached to a log record.
pub type Fields<'a> = &'a [(&'a str, String)];

/// Structured logger.
pub trait Logger: Send + Sync + 'static {
    /// Emits one record.
    fn log(&self, level: Level, message: &str, fields: Fields<'_>);

    /// Emits a debug record.
    fn debug(&self, message: &str, fields: Fields<'_>) {
        self.log(Level::Debug, message, fields);
    }

    /// Emits an info record.
    fn info(&self, message: &str, fields: Fields<'_>) {
        self.log(Level::Info, message, fields);
    }

    /// Emits a warning record.
    fn warn(&self, message: &str, fields: Fields<'_>) {
        self.log(Level::Warn, message, fields);
    }

    /// Emits an error record.
    fn error(&self, message: &str, fields: Fields<'_>) {
        self.log(Level::Error, message, fields);
    }
}

/// Renders fields as `key=value` pairs separated by spaces.
#[must_use]
pub fn render_fields(fields: Fields<'_>) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Logger that forwards to `tracing` under the `courier` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str, fields: Fields<'_>) {
        let fields = render_fields(fields);
        match level {
            Level::Debug => tracing::debug!(target: "courier", fields = %fields, "{message}"),
            Level::Info => tracing::info!(target: "courier", fields = %fields, "{message}"),
            Level::Warn => tracing::warn!(target: "courier", fields = %fields, "{message}"),
            Level::Error => tracing::error!(target: "courier", fields = %fields, "{message}"),
        }
    }
}

/// Printf-style logger for collaborators.
///
/// ```
/// use courier_core::{LoggerAdapter, PrintfLogger, Level, TracingLogger};
/// use std::sync::Arc;
///
/// let log = LoggerAdapter::new(Arc::new(TracingLogger));
/// log.printf(Level::Info, format_args!("fetched {} repos", 3));
/// ```
pub trait PrintfLogger: Send + Sync {
    /// Emits one formatted line.
    fn printf(&self, level: Level, args: fmt::Arguments<'_>);
}

/// Adapts a structured [`Logger`] to [`PrintfLogger`].
#[derive(Clone)]
pub struct LoggerAdapter {
    inner: Arc<dyn Logger>,
}

impl LoggerAdapter {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn Logger>) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for LoggerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerAdapter").finish_non_exhaustive()
    }
}

impl PrintfLogger for LoggerAdapter {
    fn printf(&self, level: Level, args: fmt::Arguments<'_>) {
        let message = args.to_string();
        self.inner.log(level, &message, &[]);
    }
}
