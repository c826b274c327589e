//! Dispatch metrics.
//!
//! [`MetricsRegistry`] is the in-process source of truth: atomic totals plus
//! per-command statistics, readable at any time through [`snapshot`]. Every
//! observation is also mirrored to the `metrics` facade so an embedding
//! program that installs a recorder (see [`install_prometheus_recorder`])
//! can scrape them.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `courier_dispatch_total` | Counter | `command`, `outcome` | Dispatches |
//! | `courier_dispatch_duration_seconds` | Histogram | `command` | Dispatch latency |
//!
//! [`snapshot`]: MetricsRegistry::snapshot

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Bucket used for commands no handler claims, so arbitrary user input
/// cannot grow the per-command map.
pub const UNKNOWN_COMMAND: &str = "unknown";

#[derive(Debug, Clone)]
struct CommandStats {
    count: u64,
    total_ns: u64,
    errors: u64,
    last_used: DateTime<Utc>,
    last_seq: u64,
}

/// Per-command statistics in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSnapshot {
    /// Dispatches.
    pub count: u64,
    /// Accumulated duration in nanoseconds.
    pub total_ns: u64,
    /// Failed dispatches.
    pub errors: u64,
    /// Wall-clock time of the most recent dispatch.
    pub last_used: DateTime<Utc>,
}

impl CommandSnapshot {
    /// Mean duration per dispatch.
    #[must_use]
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_ns / self.count)
        }
    }
}

/// Point-in-time copy of the registry, safe to serialize.
///
/// Each counter is read atomically on its own; ratios across counters may
/// be off by in-flight dispatches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// All dispatches.
    pub total: u64,
    /// Dispatches counted as successful.
    pub successful: u64,
    /// Dispatches counted as failed.
    pub failed: u64,
    /// Seconds since the registry was created or last reset.
    pub uptime_s: u64,
    /// Per-command statistics keyed by command token.
    pub per_command: BTreeMap<String, CommandSnapshot>,
}

impl MetricsSnapshot {
    /// Fraction of successful dispatches, 1.0 when nothing ran yet.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.successful as f64 / self.total as f64
        }
    }
}

/// Process-wide dispatch counters.
///
/// An owned value, shared by `Arc` with the metrics middleware and whoever
/// reports on it.
///
/// # Example
///
/// ```
/// use courier_telemetry::MetricsRegistry;
/// use std::time::Duration;
///
/// let registry = MetricsRegistry::new();
/// registry.record("/weather", Duration::from_millis(120), false);
/// registry.record("/weather", Duration::from_millis(80), true);
///
/// let snapshot = registry.snapshot();
/// assert_eq!(snapshot.total, 2);
/// assert_eq!(snapshot.failed, 1);
/// assert_eq!(snapshot.per_command["/weather"].errors, 1);
/// ```
#[derive(Debug)]
pub struct MetricsRegistry {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    sequence: AtomicU64,
    started_at: Mutex<Instant>,
    per_command: RwLock<HashMap<String, CommandStats>>,
}

impl MetricsRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            sequence: AtomicU64::new(0),
            started_at: Mutex::new(Instant::now()),
            per_command: RwLock::new(HashMap::new()),
        }
    }

    /// Records one finished dispatch.
    pub fn record(&self, command: &str, duration: Duration, failed: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.successful.fetch_add(1, Ordering::Relaxed);
        }

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        let wall = Utc::now();

        {
            let mut per_command = self.per_command.write();
            let stats = per_command
                .entry(command.to_string())
                .or_insert_with(|| CommandStats {
                    count: 0,
                    total_ns: 0,
                    errors: 0,
                    last_used: wall,
                    last_seq: seq,
                });
            stats.count += 1;
            stats.total_ns = stats.total_ns.saturating_add(nanos);
            if failed {
                stats.errors += 1;
            }
            stats.last_used = wall;
            stats.last_seq = seq;
        }

        let outcome = if failed { "failure" } else { "success" };
        counter!(
            "courier_dispatch_total",
            "command" => command.to_string(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!(
            "courier_dispatch_duration_seconds",
            "command" => command.to_string()
        )
        .record(duration.as_secs_f64());
    }

    /// Returns the total number of dispatches.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Returns the number of failed dispatches.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Returns a serializable copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let per_command = self
            .per_command
            .read()
            .iter()
            .map(|(command, stats)| (command.clone(), Self::snapshot_of(stats)))
            .collect();

        MetricsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            uptime_s: self.started_at.lock().elapsed().as_secs(),
            per_command,
        }
    }

    /// Returns the `n` most used commands.
    ///
    /// Ordered by count descending; ties go to the most recently used.
    pub fn top(&self, n: usize) -> Vec<(String, CommandSnapshot)> {
        let mut ranked: Vec<(String, u64, u64, CommandSnapshot)> = self
            .per_command
            .read()
            .iter()
            .map(|(command, stats)| {
                (
                    command.clone(),
                    stats.count,
                    stats.last_seq,
                    Self::snapshot_of(stats),
                )
            })
            .collect();

        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.2.cmp(&a.2)));
        ranked
            .into_iter()
            .take(n)
            .map(|(command, _, _, snapshot)| (command, snapshot))
            .collect()
    }

    /// Zeroes every counter and restarts the uptime clock.
    pub fn reset(&self) {
        self.per_command.write().clear();
        self.total.store(0, Ordering::Relaxed);
        self.successful.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        *self.started_at.lock() = Instant::now();
    }

    fn snapshot_of(stats: &CommandStats) -> CommandSnapshot {
        CommandSnapshot {
            count: stats.count,
            total_ns: stats.total_ns,
            errors: stats.errors,
            last_used: stats.last_used,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs a global Prometheus recorder and describes the standard metrics.
///
/// Returns the handle used to render the exposition text. Call at most once
/// per process.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if a recorder is already installed.
pub fn install_prometheus_recorder() -> TelemetryResult<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    describe_metrics();
    Ok(handle)
}

/// Registers descriptions for the standard metrics.
pub fn describe_metrics() {
    describe_counter!(
        "courier_dispatch_total",
        "Total number of dispatched commands by command and outcome"
    );
    describe_histogram!(
        "courier_dispatch_duration_seconds",
        "Command dispatch duration in seconds"
    );
}
