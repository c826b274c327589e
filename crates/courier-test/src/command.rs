//! Command fixtures.

use courier_core::{Attachment, Chat, Command, User};

/// Builds a private-chat command from `user_id`.
pub fn command(text: &str, user_id: i64) -> Command {
    CommandBuilder::new(text).user_id(user_id).build()
}

/// Builder for test commands.
///
/// Defaults to user 1 in their private chat.
#[must_use]
pub struct CommandBuilder {
    text: String,
    user: User,
    chat: Option<Chat>,
    attachments: Vec<Attachment>,
}

impl CommandBuilder {
    /// Starts a command with `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            user: User::new(1),
            chat: None,
            attachments: Vec::new(),
        }
    }

    /// Sets the sender id.
    pub fn user_id(mut self, id: i64) -> Self {
        self.user.id = id;
        self
    }

    /// Sets the sender username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.user = self.user.with_username(username);
        self
    }

    /// Sets the sender language tag.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.user = self.user.with_language(language);
        self
    }

    /// Sends from a group chat instead of the private chat.
    pub fn group(mut self, id: i64, title: impl Into<String>) -> Self {
        self.chat = Some(Chat::group(id, title));
        self
    }

    /// Adds an attachment.
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Builds the command.
    pub fn build(self) -> Command {
        let chat = self.chat.unwrap_or_else(|| Chat::private(self.user.id));
        let mut cmd = Command::new(self.text, self.user, chat);
        cmd.attachments = self.attachments;
        cmd
    }
}
