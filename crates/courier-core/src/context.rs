//! Per-dispatch context.
//!
//! The [`DispatchContext`] flows through the middleware chain into the
//! handler. Middleware enriches it (the auth stage attaches the authoritative
//! [`UserRecord`]); the handler reads from it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::DispatchError;
use crate::services::UserRecord;

/// Context for one dispatch.
///
/// Carries the deadline set by the adapter, the authoritative user once auth
/// has run, and type-keyed extensions for middleware that need to pass data
/// inward.
///
/// # Example
///
/// ```
/// use courier_core::DispatchContext;
/// use std::time::Duration;
///
/// let ctx = DispatchContext::new().with_timeout(Duration::from_secs(30));
/// assert!(!ctx.is_expired());
/// assert!(ctx.check_deadline().is_ok());
/// ```
#[derive(Debug)]
pub struct DispatchContext {
    deadline: Option<Instant>,
    started_at: Instant,
    user: Option<UserRecord>,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl DispatchContext {
    /// Creates a context without a deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deadline: None,
            started_at: Instant::now(),
            user: None,
            extensions: HashMap::new(),
        }
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.with_deadline(deadline)
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left before the deadline.
    ///
    /// `None` means no deadline; `Some(Duration::ZERO)` means expired.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns true if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Fails with [`DispatchError::DeadlineExceeded`] if the deadline has passed.
    ///
    /// Call before starting any outbound collaborator call.
    pub fn check_deadline(&self) -> Result<(), DispatchError> {
        if self.is_expired() {
            Err(DispatchError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Runs `future` bounded by the deadline.
    ///
    /// Without a deadline the future runs to completion.
    pub async fn run_until_deadline<F, T>(&self, future: F) -> Result<T, DispatchError>
    where
        F: Future<Output = T>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, future)
                .await
                .map_err(|_| DispatchError::DeadlineExceeded),
            None => Ok(future.await),
        }
    }

    /// Returns when the dispatch started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the time since the dispatch started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the authoritative user, once auth has attached one.
    #[must_use]
    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    /// Attaches the authoritative user.
    ///
    /// Only the auth stage should call this.
    pub fn set_user(&mut self, user: UserRecord) {
        self.user = Some(user);
    }

    /// Stores a typed extension value, replacing any previous value of the same type.
    ///
    /// # Example
    ///
    /// ```
    /// use courier_core::DispatchContext;
    ///
    /// struct CacheHit(bool);
    ///
    /// let mut ctx = DispatchContext::new();
    /// ctx.set_extension(CacheHit(true));
    /// assert!(ctx.get_extension::<CacheHit>().unwrap().0);
    /// ```
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// Returns true if an extension of type `T` is stored.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::new()
    }
}
