//! External collaborator contracts.
//!
//! The pipeline depends on two stores it does not own: the [`UserService`]
//! (used by auth) and the [`ActivityStore`] (used by activity logging). Both
//! are async traits so implementations can sit on any database or API.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::command::User;
use crate::error::ServiceError;

/// Authoritative user record held by the user service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// External user ID.
    pub id: i64,
    /// Username.
    pub username: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Preferred language.
    pub language: String,
    /// Whether the account is active.
    pub is_active: bool,
    /// When the user first talked to the bot.
    pub created_at: DateTime<Utc>,
    /// Last time the user sent a command.
    pub last_active_at: DateTime<Utc>,
}

/// Data needed to register a new user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// External user ID.
    pub id: i64,
    /// Username.
    pub username: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Language tag reported by the client, if any.
    pub language_code: Option<String>,
}

impl From<&User> for Registration {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            language_code: user.language_code.clone(),
        }
    }
}

/// Aggregate user counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    /// Registered users.
    pub total: u64,
    /// Users with the active flag set.
    pub active: u64,
    /// Users registered today.
    pub new_today: u64,
    /// Users who sent a command today.
    pub active_today: u64,
}

/// One logged command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// External user ID.
    pub user_id: i64,
    /// Command text as dispatched.
    pub command: String,
    /// When the command ran.
    pub at: DateTime<Utc>,
}

/// User store consulted by the auth stage.
#[async_trait]
pub trait UserService: Send + Sync + 'static {
    /// Looks up a user. An unknown user is `Ok(None)`, not an error.
    async fn get(&self, id: i64) -> Result<Option<UserRecord>, ServiceError>;

    /// Registers a new user and returns the stored record.
    async fn register(&self, registration: Registration) -> Result<UserRecord, ServiceError>;

    /// Updates the user's last-active time. Best effort.
    async fn touch(&self, id: i64) -> Result<(), ServiceError>;

    /// Returns aggregate counts.
    async fn stats(&self) -> Result<UserStats, ServiceError>;
}

/// Activity log written after successful dispatches.
#[async_trait]
pub trait ActivityStore: Send + Sync + 'static {
    /// Records one command.
    async fn log(&self, user_id: i64, command: &str, at: DateTime<Utc>) -> Result<(), ServiceError>;

    /// Returns the most used commands with their counts.
    async fn popular(&self, limit: usize) -> Result<HashMap<String, u64>, ServiceError>;

    /// Returns today's counters (`commands`, `users`, ...).
    async fn daily(&self) -> Result<HashMap<String, u64>, ServiceError>;

    /// Returns a user's most recent commands, newest first.
    async fn recent(&self, user_id: i64, limit: usize) -> Result<Vec<Activity>, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_from_user() {
        let user = User::new(42)
            .with_username("aziz")
            .with_name("Aziz", None)
            .with_language("uz");
        let registration = Registration::from(&user);
        assert_eq!(registration.id, 42);
        assert_eq!(registration.username.as_deref(), Some("aziz"));
        assert_eq!(registration.language_code.as_deref(), Some("uz"));
    }

    #[test]
    fn test_stats_default() {
        let stats = UserStats::default();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.active_today, 0);
    }
}
