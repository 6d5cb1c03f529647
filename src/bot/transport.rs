//! Transport-agnostic event types
//!
//! The router consumes [`InboundEvent`]s and emits [`OutboundMessage`]s through
//! an [`Outbox`]. Telegram is one implementation; tests use another.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while delivering outbound messages
#[derive(Error, Debug)]
pub enum TransportError {
    /// The messaging API rejected or failed the request
    #[error("Send failed: {0}")]
    Send(String),
}

/// Kind of chat an event came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    /// One-to-one chat with the bot
    Direct,
    /// Multi-party chat (group or supergroup)
    Group,
}

/// A text message or button press delivered to the bot
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    /// Chat the event belongs to
    pub chat_id: i64,
    /// Sender of the message or presser of the button
    pub user_id: i64,
    /// Direct or group chat
    pub chat_kind: ChatKind,
    /// ID of the inbound message, used for in-thread replies
    pub message_id: Option<i32>,
    /// Message text (empty for button presses)
    pub text: String,
    /// Token of the pressed inline button, if this is an interaction
    pub interaction: Option<String>,
}

impl InboundEvent {
    /// Builds a text message event
    #[must_use]
    pub fn message(chat_id: i64, user_id: i64, chat_kind: ChatKind, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            user_id,
            chat_kind,
            message_id: None,
            text: text.into(),
            interaction: None,
        }
    }

    /// Builds a button-press event carrying `token`
    #[must_use]
    pub fn interaction(
        chat_id: i64,
        user_id: i64,
        chat_kind: ChatKind,
        token: impl Into<String>,
    ) -> Self {
        Self {
            chat_id,
            user_id,
            chat_kind,
            message_id: None,
            text: String::new(),
            interaction: Some(token.into()),
        }
    }

    /// Sets the inbound message ID
    #[must_use]
    pub fn with_message_id(mut self, message_id: i32) -> Self {
        self.message_id = Some(message_id);
        self
    }
}

/// How the outbound text should be rendered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MessageFormat {
    /// Sent as-is
    #[default]
    Plain,
    /// Telegram HTML subset
    Html,
}

/// A single actionable button attached to a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineControl {
    /// Button caption
    pub label: String,
    /// Opaque token returned in [`InboundEvent::interaction`] when pressed
    pub token: String,
}

/// A message the bot wants delivered
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Target chat
    pub chat_id: i64,
    /// Message text
    pub text: String,
    /// Reply to this message in-thread
    pub reply_to: Option<i32>,
    /// Rendering of `text`
    pub format: MessageFormat,
    /// Optional button
    pub control: Option<InlineControl>,
}

impl OutboundMessage {
    /// Plain text message to `chat_id`
    #[must_use]
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to: None,
            format: MessageFormat::Plain,
            control: None,
        }
    }

    /// HTML message to `chat_id`
    #[must_use]
    pub fn html(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            format: MessageFormat::Html,
            ..Self::text(chat_id, text)
        }
    }

    /// Replies in-thread to `message_id` when present
    #[must_use]
    pub fn reply_to(mut self, message_id: Option<i32>) -> Self {
        self.reply_to = message_id;
        self
    }

    /// Attaches a button
    #[must_use]
    pub fn with_control(mut self, control: InlineControl) -> Self {
        self.control = Some(control);
        self
    }
}

/// Interface for delivering outbound messages
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Delivers one message
    async fn send(&self, message: OutboundMessage) -> Result<(), TransportError>;
}
