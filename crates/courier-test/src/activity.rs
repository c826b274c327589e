//! In-memory activity store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::{Activity, ActivityStore, ServiceError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// An [`ActivityStore`] that keeps entries in memory.
///
/// Writes happen on background tasks, so tests await them with
/// [`wait_for`](Self::wait_for) instead of sleeping.
#[derive(Debug, Default)]
pub struct InMemoryActivityStore {
    entries: Mutex<Vec<Activity>>,
    written: Notify,
    fail: AtomicBool,
}

impl InMemoryActivityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `log` fail.
    #[must_use]
    pub fn failing(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    /// Returns all entries in insertion order.
    pub fn entries(&self) -> Vec<Activity> {
        self.entries.lock().clone()
    }

    /// Waits until at least `count` entries exist or `timeout` passes.
    ///
    /// Returns true if the count was reached.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let reached = async {
            loop {
                let notified = self.written.notified();
                if self.entries.lock().len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, reached).await.is_ok()
    }
}

#[async_trait]
impl ActivityStore for InMemoryActivityStore {
    async fn log(&self, user_id: i64, command: &str, at: DateTime<Utc>) -> Result<(), ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable("activity store offline"));
        }
        self.entries.lock().push(Activity {
            user_id,
            command: command.to_string(),
            at,
        });
        self.written.notify_waiters();
        Ok(())
    }

    async fn popular(&self, limit: usize) -> Result<HashMap<String, u64>, ServiceError> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for entry in self.entries.lock().iter() {
            let head = courier_core::command_token(&entry.command).unwrap_or_default();
            *counts.entry(head.to_string()).or_default() += 1;
        }

        let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(ranked.into_iter().take(limit).collect())
    }

    async fn daily(&self) -> Result<HashMap<String, u64>, ServiceError> {
        let today = Utc::now().date_naive();
        let entries = self.entries.lock();
        let todays: Vec<&Activity> = entries
            .iter()
            .filter(|entry| entry.at.date_naive() == today)
            .collect();
        let users: HashSet<i64> = todays.iter().map(|entry| entry.user_id).collect();

        Ok(HashMap::from([
            ("commands".to_string(), todays.len() as u64),
            ("users".to_string(), users.len() as u64),
        ]))
    }

    async fn recent(&self, user_id: i64, limit: usize) -> Result<Vec<Activity>, ServiceError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .rev()
            .filter(|entry| entry.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
