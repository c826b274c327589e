//! Observability for Courier.
//!
//! - **Metrics**: an in-process [`MetricsRegistry`] whose observations are
//!   mirrored to the `metrics` facade (Prometheus exporter optional)
//! - **Logging**: structured `tracing` output, JSON in production
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_telemetry::{init_logging, LogConfig, MetricsRegistry};
//! use std::sync::Arc;
//!
//! init_logging(&LogConfig::production())?;
//! let registry = Arc::new(MetricsRegistry::new());
//! // hand `registry` to the metrics middleware, read `registry.snapshot()`
//! ```

#![doc(html_root_url = "https://docs.rs/courier-telemetry/0.1.0")]

mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use self::metrics::{
    describe_metrics, install_prometheus_recorder, CommandSnapshot, MetricsRegistry,
    MetricsSnapshot, UNKNOWN_COMMAND,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
