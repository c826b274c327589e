//! Inbound command types.
//!
//! A [`Command`] is the normalized form of one inbound chat message. Adapters
//! build it from platform events; everything downstream of the adapter works
//! on this shape only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one inbound command.
///
/// Uses UUID v7 so identifiers sort by creation time, which keeps log
/// correlation readable.
///
/// # Example
///
/// ```
/// use courier_core::CommandId;
///
/// let a = CommandId::new();
/// let b = CommandId::new();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Uuid);

impl CommandId {
    /// Creates a new unique command ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CommandId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Snapshot of the sending user as reported by the platform.
///
/// This is what the adapter saw on the wire. The authoritative record lives
/// in the user service and is attached to the dispatch context by the auth
/// stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable external user ID.
    pub id: i64,
    /// Platform username, without the leading `@`.
    pub username: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// IETF language tag reported by the client.
    pub language_code: Option<String>,
    /// Whether the account is active.
    pub is_active: bool,
}

impl User {
    /// Creates a user snapshot with only an ID.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id,
            username: None,
            first_name: None,
            last_name: None,
            language_code: None,
            is_active: true,
        }
    }

    /// Sets the username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets first and last name.
    #[must_use]
    pub fn with_name(mut self, first: impl Into<String>, last: Option<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = last;
        self
    }

    /// Sets the language tag.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language_code = Some(language.into());
        self
    }

    /// Returns a human-readable name.
    ///
    /// Prefers "first last", then the username, then the numeric ID.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name, &self.username) {
            (Some(first), Some(last), _) => format!("{first} {last}"),
            (Some(first), None, _) => first.clone(),
            (None, _, Some(username)) => format!("@{username}"),
            (None, _, None) => self.id.to_string(),
        }
    }
}

/// Kind of chat a command arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    /// One-to-one conversation with the bot.
    Private,
    /// Group, supergroup or channel.
    Group,
}

/// The chat a command arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Stable external chat ID.
    pub id: i64,
    /// Chat kind.
    pub kind: ChatKind,
    /// Chat title, for groups.
    pub title: Option<String>,
}

impl Chat {
    /// Creates a private chat.
    #[must_use]
    pub fn private(id: i64) -> Self {
        Self {
            id,
            kind: ChatKind::Private,
            title: None,
        }
    }

    /// Creates a group chat.
    #[must_use]
    pub fn group(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            kind: ChatKind::Group,
            title: Some(title.into()),
        }
    }
}

/// An opaque attachment descriptor.
///
/// The pipeline never inspects attachments; they are carried through to the
/// handler untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Platform-specific kind ("document", "photo", ...).
    pub kind: String,
    /// Platform file identifier.
    pub file_id: String,
    /// Original file name.
    pub file_name: Option<String>,
    /// MIME type.
    pub mime_type: Option<String>,
    /// Size in bytes.
    pub size: Option<u64>,
}

/// One inbound command.
///
/// # Example
///
/// ```
/// use courier_core::{Chat, Command, User};
///
/// let cmd = Command::new("  /repo rust-lang/rust ", User::new(1), Chat::private(1));
/// assert_eq!(cmd.text, "/repo rust-lang/rust");
/// assert_eq!(cmd.head(), Some("/repo"));
/// assert_eq!(cmd.args().collect::<Vec<_>>(), vec!["rust-lang/rust"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Unique ID for log correlation.
    pub id: CommandId,
    /// Command text, trimmed.
    pub text: String,
    /// Sender snapshot.
    pub user: User,
    /// Originating chat.
    pub chat: Chat,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
    /// Opaque attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Command {
    /// Creates a command stamped with a fresh ID and the current time.
    #[must_use]
    pub fn new(text: impl Into<String>, user: User, chat: Chat) -> Self {
        let text: String = text.into();
        Self {
            id: CommandId::new(),
            text: text.trim().to_string(),
            user,
            chat,
            timestamp: Utc::now(),
            attachments: Vec::new(),
        }
    }

    /// Sets the message timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Returns the command token, or `None` for empty text.
    ///
    /// See [`command_token`] for the matching rule.
    #[must_use]
    pub fn head(&self) -> Option<&str> {
        command_token(&self.text)
    }

    /// Returns the whitespace-separated arguments after the head token.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.text.split_whitespace().skip(1)
    }

    /// Returns the number of whitespace-separated tokens, head included.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Extracts the command token from message text.
///
/// The token is the first whitespace-separated word with any `@botname`
/// suffix removed, so `/start@courier_bot` and `/start` resolve to the same
/// handler. Matching against handler prefixes is exact and case-sensitive.
///
/// # Example
///
/// ```
/// use courier_core::command_token;
///
/// assert_eq!(command_token("/start@courier_bot now"), Some("/start"));
/// assert_eq!(command_token("/Start"), Some("/Start"));
/// assert_eq!(command_token("   "), None);
/// ```
#[must_use]
pub fn command_token(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let token = match first.find('@') {
        Some(at) if at > 0 => &first[..at],
        _ => first,
    };
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_trims_text() {
        let cmd = Command::new("\t/ping \n", User::new(7), Chat::private(7));
        assert_eq!(cmd.text, "/ping");
        assert_eq!(cmd.token_count(), 1);
    }

    #[test]
    fn test_empty_head() {
        let cmd = Command::new("   ", User::new(7), Chat::private(7));
        assert_eq!(cmd.head(), None);
        assert_eq!(cmd.args().count(), 0);
    }

    #[test]
    fn test_head_strips_mention() {
        assert_eq!(command_token("/help@bot"), Some("/help"));
        assert_eq!(command_token("@bot"), Some("@bot"));
    }

    #[test]
    fn test_head_is_case_sensitive() {
        assert_ne!(command_token("/REPO x"), Some("/repo"));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(User::new(5).display_name(), "5");
        assert_eq!(User::new(5).with_username("ada").display_name(), "@ada");
        assert_eq!(
            User::new(5)
                .with_name("Ada", Some("Lovelace".to_string()))
                .display_name(),
            "Ada Lovelace"
        );
    }

    #[test]
    fn test_command_ids_unique() {
        let a = Command::new("/a", User::new(1), Chat::private(1));
        let b = Command::new("/a", User::new(1), Chat::private(1));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_command_serialization() {
        let cmd = Command::new("/weather Paris", User::new(1), Chat::group(-100, "team"));
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"kind\":\"group\""));
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    proptest::proptest! {
        #[test]
        fn prop_token_is_mention_free_prefix(text in "[ /a-zA-Z@_]{0,32}") {
            match command_token(&text) {
                None => proptest::prop_assert!(text.trim().is_empty()),
                Some(token) => {
                    let first = text.split_whitespace().next().unwrap_or_default();
                    proptest::prop_assert!(first.starts_with(token));
                    proptest::prop_assert!(!token.is_empty());
                    proptest::prop_assert!(token.starts_with('@') || !token.contains('@'));
                }
            }
        }
    }
}
