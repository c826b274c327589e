//! In-memory user service.

use async_trait::async_trait;
use chrono::Utc;
use courier_core::{Registration, ServiceError, UserRecord, UserService, UserStats};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A [`UserService`] backed by a map, with scriptable failures.
///
/// Registered users get the language from their registration, or the
/// configured default when the client reported none.
#[derive(Debug)]
pub struct InMemoryUserService {
    users: RwLock<HashMap<i64, UserRecord>>,
    default_language: String,
    fail_get: AtomicBool,
    fail_register: AtomicBool,
    get_calls: AtomicUsize,
    register_calls: AtomicUsize,
    touch_calls: AtomicUsize,
}

impl Default for InMemoryUserService {
    fn default() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            default_language: "en".to_string(),
            fail_get: AtomicBool::new(false),
            fail_register: AtomicBool::new(false),
            get_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
            touch_calls: AtomicUsize::new(0),
        }
    }
}

impl InMemoryUserService {
    /// Creates an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a plain active record.
    pub fn record(id: i64, language: &str) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id,
            username: None,
            first_name: None,
            last_name: None,
            language: language.to_string(),
            is_active: true,
            created_at: now,
            last_active_at: now,
        }
    }

    /// Sets the language given to users registered without one.
    #[must_use]
    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    /// Makes every `get` fail.
    #[must_use]
    pub fn failing_get(self) -> Self {
        self.fail_get.store(true, Ordering::SeqCst);
        self
    }

    /// Makes every `register` fail.
    #[must_use]
    pub fn failing_register(self) -> Self {
        self.fail_register.store(true, Ordering::SeqCst);
        self
    }

    /// Toggles `get` failures at runtime.
    pub fn set_fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    /// Stores a user directly.
    pub fn insert(&self, user: UserRecord) {
        self.users.write().insert(user.id, user);
    }

    /// Returns the stored user.
    pub fn user(&self, id: i64) -> Option<UserRecord> {
        self.users.read().get(&id).cloned()
    }

    /// Number of `get` calls.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of `register` calls.
    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    /// Number of `touch` calls.
    pub fn touch_calls(&self) -> usize {
        self.touch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserService for InMemoryUserService {
    async fn get(&self, id: i64) -> Result<Option<UserRecord>, ServiceError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable("user store offline"));
        }
        Ok(self.user(id))
    }

    async fn register(&self, registration: Registration) -> Result<UserRecord, ServiceError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(ServiceError::rejected("registration refused"));
        }

        let language = registration
            .language_code
            .unwrap_or_else(|| self.default_language.clone());
        let mut user = Self::record(registration.id, &language);
        user.username = registration.username;
        user.first_name = registration.first_name;
        user.last_name = registration.last_name;

        self.insert(user.clone());
        Ok(user)
    }

    async fn touch(&self, id: i64) -> Result<(), ServiceError> {
        self.touch_calls.fetch_add(1, Ordering::SeqCst);
        match self.users.write().get_mut(&id) {
            Some(user) => {
                user.last_active_at = Utc::now();
                Ok(())
            }
            None => Err(ServiceError::rejected(format!("unknown user {id}"))),
        }
    }

    async fn stats(&self) -> Result<UserStats, ServiceError> {
        let users = self.users.read();
        let today = Utc::now().date_naive();
        let active = users.values().filter(|u| u.is_active).count() as u64;
        Ok(UserStats {
            total: users.len() as u64,
            active,
            new_today: users
                .values()
                .filter(|u| u.created_at.date_naive() == today)
                .count() as u64,
            active_today: users
                .values()
                .filter(|u| u.last_active_at.date_naive() == today)
                .count() as u64,
        })
    }
}
