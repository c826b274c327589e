//! Messaging-platform adapter contract.
//!
//! A platform integration supplies two pieces: a conversion from its inbound
//! event type to [`Command`] ([`IntoCommand`]) and an outbound [`ReplySink`].
//! [`AdapterBridge`] connects them to a [`Bot`], running one task per message.
//!
//! ```ignore
//! let bridge = AdapterBridge::new(bot, Arc::new(TelegramSink::new(token)));
//! while let Some(update) = updates.next().await {
//!     bridge.handle(update);
//! }
//! ```

use crate::Bot;
use async_trait::async_trait;
use courier_core::{Chat, Command, FormatHint, Response, User};
use courier_middleware::Outcome;
use courier_telemetry::logging::fields;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Converts a platform event into a command.
pub trait IntoCommand {
    /// Returns `None` for events that carry no text.
    fn into_command(self) -> Option<Command>;
}

impl IntoCommand for Command {
    fn into_command(self) -> Option<Command> {
        Some(self)
    }
}

/// A reply ready for the platform's send call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedReply {
    /// Reply text.
    pub text: String,
    /// Platform parse mode, absent for plain text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
    /// Suppress link previews.
    pub disable_link_preview: bool,
}

impl RenderedReply {
    /// Maps a format hint to the platform's parse mode.
    pub fn parse_mode_for(format: FormatHint) -> Option<&'static str> {
        match format {
            FormatHint::Plain => None,
            FormatHint::Markdown => Some("MarkdownV2"),
            FormatHint::Html => Some("HTML"),
        }
    }
}

impl From<Response> for RenderedReply {
    fn from(response: Response) -> Self {
        Self {
            parse_mode: Self::parse_mode_for(response.format),
            text: response.text,
            disable_link_preview: response.disable_link_preview,
        }
    }
}

/// Outbound side of a platform integration.
#[async_trait]
pub trait ReplySink: Send + Sync + 'static {
    /// Sends `reply` to `chat_id`.
    async fn send(&self, chat_id: i64, reply: RenderedReply) -> anyhow::Result<()>;
}

/// A platform-neutral inbound text message.
///
/// Useful for webhook payloads that are already flattened, and in tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Sender id.
    pub user_id: i64,
    /// Sender username.
    #[serde(default)]
    pub username: Option<String>,
    /// Sender first name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Sender IETF language tag.
    #[serde(default)]
    pub language_code: Option<String>,
    /// Chat id.
    pub chat_id: i64,
    /// Group title; absent for private chats.
    #[serde(default)]
    pub chat_title: Option<String>,
    /// Message text.
    #[serde(default)]
    pub text: Option<String>,
}

impl IntoCommand for IncomingMessage {
    fn into_command(self) -> Option<Command> {
        let text = self.text.filter(|text| !text.trim().is_empty())?;

        let mut user = User::new(self.user_id);
        if let Some(username) = self.username {
            user = user.with_username(username);
        }
        if let Some(first) = self.first_name {
            user = user.with_name(first, None);
        }
        if let Some(language) = self.language_code {
            user = user.with_language(language);
        }

        let chat = match self.chat_title {
            Some(title) => Chat::group(self.chat_id, title),
            None => Chat::private(self.chat_id),
        };

        Some(Command::new(text, user, chat))
    }
}

/// Connects a platform event stream to a [`Bot`].
#[derive(Clone)]
pub struct AdapterBridge {
    bot: Bot,
    sink: Arc<dyn ReplySink>,
}

impl AdapterBridge {
    /// Creates a bridge sending replies through `sink`.
    pub fn new(bot: Bot, sink: Arc<dyn ReplySink>) -> Self {
        Self { bot, sink }
    }

    /// Returns the bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Converts `event` and processes it on its own task.
    ///
    /// Returns `None`, spawning nothing, if the event carries no command.
    pub fn handle<E: IntoCommand>(&self, event: E) -> Option<JoinHandle<Outcome>> {
        let cmd = event.into_command()?;
        let bridge = self.clone();
        Some(tokio::spawn(async move { bridge.process(cmd).await }))
    }

    /// Dispatches `cmd` and sends the reply.
    ///
    /// Send failures are logged and swallowed.
    pub async fn process(&self, cmd: Command) -> Outcome {
        let chat_id = cmd.chat.id;
        let command_id = cmd.id.to_string();
        let user_id = cmd.user.id;

        let outcome = self.bot.dispatch(cmd).await;
        if outcome.response.is_empty() {
            return outcome;
        }

        let reply = RenderedReply::from(outcome.response.clone());
        if let Err(error) = self.sink.send(chat_id, reply).await {
            self.bot.logger().error(
                "reply send failed",
                &[
                    (fields::COMMAND_ID, command_id),
                    (fields::USER_ID, user_id.to_string()),
                    (fields::CHAT_ID, chat_id.to_string()),
                    (fields::ERROR, format!("{error:#}")),
                ],
            );
        }
        outcome
    }
}

impl std::fmt::Debug for AdapterBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterBridge")
            .field("bot", &self.bot)
            .finish_non_exhaustive()
    }
}
