//! Registry of process-lifetime background tasks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{TaskError, TaskResult};
use crate::shutdown::ShutdownSignal;
use crate::task::{TaskId, TaskStats};

/// Configuration for [`BackgroundTasks`].
#[derive(Debug, Clone)]
pub struct TasksConfig {
    /// Maximum number of tasks running at once.
    pub max_concurrent: usize,
    /// How long `close()` waits for tasks before aborting them.
    pub shutdown_grace: Duration,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10_000,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl TasksConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum concurrent tasks.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Set the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

/// How a tracked task ended.
enum Exit {
    Completed,
    Cancelled,
}

/// Decrements the running count however the task ends (return, abort, panic).
struct RunningGuard(Arc<TaskStats>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.record_exit();
    }
}

struct Registered {
    name: String,
    handle: JoinHandle<()>,
}

struct Inner {
    config: TasksConfig,
    /// Held for read from the closed check until the task is registered;
    /// `close()` takes it for write to flip the flag.
    spawn_gate: RwLock<bool>,
    registry: DashMap<TaskId, Registered>,
    stats: Arc<TaskStats>,
    shutdown: ShutdownSignal,
}

/// Owned registry of background tasks.
///
/// Everything the pipeline runs outside the request path goes through here:
/// activity-log writes, cache sweeps, rate-limit housekeeping. [`close`]
/// stops all of it deterministically.
///
/// Cloning is cheap; clones share the same registry.
///
/// [`close`]: BackgroundTasks::close
///
/// # Example
///
/// ```rust
/// use courier_tasks::BackgroundTasks;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let tasks = BackgroundTasks::new();
/// tasks.spawn("write-log", async { /* ... */ }).unwrap();
/// tasks
///     .spawn_periodic("sweep", Duration::from_secs(300), || async { /* ... */ })
///     .unwrap();
///
/// tasks.close().await;
/// assert_eq!(tasks.running_count(), 0);
/// # }
/// ```
#[derive(Clone)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

impl BackgroundTasks {
    /// Creates a registry with default configuration.
    pub fn new() -> Self {
        Self::with_config(TasksConfig::default())
    }

    /// Creates a registry with custom configuration.
    pub fn with_config(config: TasksConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                spawn_gate: RwLock::new(false),
                registry: DashMap::new(),
                stats: Arc::new(TaskStats::new()),
                shutdown: ShutdownSignal::new(),
            }),
        }
    }

    /// Returns true once `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_shutdown()
    }

    /// Returns the number of tasks currently running.
    pub fn running_count(&self) -> u64 {
        self.inner.stats.currently_running()
    }

    /// Returns lifetime task counters.
    pub fn stats(&self) -> &TaskStats {
        &self.inner.stats
    }

    /// Returns the shutdown signal tasks should observe.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.inner.shutdown.clone()
    }

    /// Returns the names of registered tasks that have not finished.
    pub fn active_task_names(&self) -> Vec<String> {
        self.inner
            .registry
            .iter()
            .filter(|entry| !entry.value().handle.is_finished())
            .map(|entry| entry.value().name.clone())
            .collect()
    }

    /// Spawns a fire-and-forget task.
    ///
    /// The task runs to completion even after `close()` is called, up to the
    /// shutdown grace period, after which it is aborted.
    pub fn spawn<F>(&self, name: impl Into<String>, task: F) -> TaskResult<TaskId>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_tracked(name.into(), async move {
            task.await;
            Exit::Completed
        })
    }

    /// Spawns a job that runs every `period` until `close()`.
    ///
    /// The first run happens one full period after spawning.
    pub fn spawn_periodic<F, Fut>(
        &self,
        name: impl Into<String>,
        period: Duration,
        mut job: F,
    ) -> TaskResult<TaskId>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period.is_zero() {
            return Err(TaskError::invalid_config("periodic task period must be > 0"));
        }

        let shutdown = self.inner.shutdown.clone();
        self.spawn_tracked(name.into(), async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = shutdown.wait() => break,
                    _ = ticker.tick() => job().await,
                }
            }
            Exit::Cancelled
        })
    }

    fn spawn_tracked<F>(&self, name: String, task: F) -> TaskResult<TaskId>
    where
        F: Future<Output = Exit> + Send + 'static,
    {
        let closed = self.inner.spawn_gate.read();
        if *closed {
            return Err(TaskError::Shutdown);
        }

        let running = self.inner.stats.currently_running();
        if running >= self.inner.config.max_concurrent as u64 {
            return Err(TaskError::spawn_failed(format!(
                "max concurrent tasks ({}) reached",
                self.inner.config.max_concurrent
            )));
        }

        self.prune_finished();

        let id = TaskId::new();
        let stats = Arc::clone(&self.inner.stats);
        stats.record_spawn();
        let guard = RunningGuard(Arc::clone(&stats));

        debug!(task_id = %id, task_name = %name, "spawning background task");

        let handle = tokio::spawn(async move {
            let _guard = guard;
            match task.await {
                Exit::Completed => stats.record_completed(),
                Exit::Cancelled => stats.record_cancelled(),
            }
        });

        self.inner.registry.insert(id, Registered { name, handle });
        drop(closed);
        Ok(id)
    }

    fn prune_finished(&self) {
        self.inner
            .registry
            .retain(|_, registered| !registered.handle.is_finished());
    }

    /// Stops all background tasks.
    ///
    /// Triggers the shutdown signal (periodic jobs exit at once), waits for
    /// in-flight tasks up to the grace period, then aborts the rest. New
    /// spawns fail with [`TaskError::Shutdown`] afterwards; a spawn accepted
    /// while `close()` runs is drained like any other. Calling `close()`
    /// again is a no-op.
    pub async fn close(&self) {
        *self.inner.spawn_gate.write() = true;
        self.inner.shutdown.trigger();
        let deadline = Instant::now() + self.inner.config.shutdown_grace;

        let mut waited = 0_usize;
        let mut aborted = 0_usize;

        loop {
            let ids: Vec<TaskId> = self.inner.registry.iter().map(|entry| *entry.key()).collect();
            if ids.is_empty() {
                break;
            }

            for id in ids {
                let Some((_, mut registered)) = self.inner.registry.remove(&id) else {
                    continue;
                };
                waited += 1;

                if tokio::time::timeout_at(deadline, &mut registered.handle)
                    .await
                    .is_err()
                {
                    warn!(task_id = %id, task_name = %registered.name, "aborting background task after grace period");
                    registered.handle.abort();
                    if matches!(registered.handle.await, Err(e) if e.is_cancelled()) {
                        self.inner.stats.record_aborted();
                        aborted += 1;
                    }
                }
            }
        }

        info!(waited, aborted, "background tasks closed");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BackgroundTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTasks")
            .field("config", &self.inner.config)
            .field("registered", &self.inner.registry.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_spawn_runs_task() {
        let tasks = BackgroundTasks::new();
        let (tx, rx) = tokio::sync::oneshot::channel();

        tasks
            .spawn("send", async move {
                let _ = tx.send(7);
            })
            .unwrap();

        assert_eq!(rx.await.unwrap(), 7);
        tasks.close().await;
        assert_eq!(tasks.stats().total_spawned(), 1);
        assert_eq!(tasks.stats().total_completed(), 1);
        assert_eq!(tasks.running_count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_after_close_fails() {
        let tasks = BackgroundTasks::new();
        tasks.close().await;
        assert!(tasks.is_closed());
        let result = tasks.spawn("late", async {});
        assert!(matches!(result, Err(TaskError::Shutdown)));
    }

    #[tokio::test]
    async fn test_max_concurrent_enforced() {
        let tasks = BackgroundTasks::with_config(TasksConfig::new().with_max_concurrent(1));
        let (_tx, rx) = tokio::sync::oneshot::channel::<()>();

        tasks
            .spawn("blocker", async move {
                let _ = rx.await;
            })
            .unwrap();

        let result = tasks.spawn("second", async {});
        assert!(matches!(result, Err(TaskError::SpawnFailed(_))));
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        let tasks = BackgroundTasks::new();
        let result = tasks.spawn_periodic("bad", Duration::ZERO, || async {});
        assert!(matches!(result, Err(TaskError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_runs_each_period() {
        let tasks = BackgroundTasks::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        tasks
            .spawn_periodic("tick", Duration::from_secs(60), move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        tasks.close().await;
        assert_eq!(tasks.stats().total_cancelled(), 1);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_aborts_after_grace() {
        let tasks = BackgroundTasks::with_config(
            TasksConfig::new().with_shutdown_grace(Duration::from_secs(1)),
        );

        tasks
            .spawn("stuck", async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
            .unwrap();
        assert_eq!(tasks.active_task_names(), vec!["stuck".to_string()]);

        tasks.close().await;
        assert_eq!(tasks.stats().total_aborted(), 1);
        assert_eq!(tasks.running_count(), 0);
    }

    #[tokio::test]
    async fn test_close_waits_for_in_flight_work() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);

        tasks
            .spawn("write", async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                flag.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        tasks.close().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_spawns_racing_close_are_drained() {
        let tasks = BackgroundTasks::with_config(TasksConfig::new().with_max_concurrent(usize::MAX));
        let finished = Arc::new(AtomicUsize::new(0));

        let spawners: Vec<_> = (0..4)
            .map(|_| {
                let tasks = tasks.clone();
                let finished = Arc::clone(&finished);
                tokio::spawn(async move {
                    let mut accepted = 0_usize;
                    loop {
                        let finished = Arc::clone(&finished);
                        let result = tasks.spawn("write", async move {
                            tokio::task::yield_now().await;
                            finished.fetch_add(1, Ordering::SeqCst);
                        });
                        match result {
                            Ok(_) => accepted += 1,
                            Err(TaskError::Shutdown) => break accepted,
                            Err(e) => panic!("unexpected spawn error: {e}"),
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(5)).await;
        tasks.close().await;
        let finished_at_close = finished.load(Ordering::SeqCst);

        let mut accepted = 0;
        for spawner in spawners {
            accepted += spawner.await.unwrap();
        }

        assert!(accepted > 0);
        assert_eq!(finished_at_close, accepted);
        assert_eq!(tasks.running_count(), 0);
        assert!(tasks.spawn("late", async {}).is_err());
    }
}
