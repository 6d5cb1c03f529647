//! Telegram transport
//!
//! Converts teloxide updates into [`InboundEvent`]s, delivers
//! [`OutboundMessage`]s through the Bot API and wires both into a dispatcher
//! handler tree.

use crate::bot::router::ConversationRouter;
use crate::bot::transport::{
    ChatKind, InboundEvent, MessageFormat, Outbox, OutboundMessage, TransportError,
};
use crate::utils::retry_telegram_operation;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{
    Chat, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, ReplyParameters,
};
use tracing::{error, warn};

/// [`Outbox`] backed by the Telegram Bot API.
///
/// Each send is retried with exponential backoff on failure.
#[derive(Clone)]
pub struct TelegramOutbox {
    bot: Bot,
}

impl TelegramOutbox {
    /// Creates an outbox sending through `bot`
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Outbox for TelegramOutbox {
    async fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        retry_telegram_operation(|| async {
            let mut req = self
                .bot
                .send_message(ChatId(message.chat_id), message.text.clone());
            if message.format == MessageFormat::Html {
                req = req.parse_mode(ParseMode::Html);
            }
            if let Some(reply_to) = message.reply_to {
                req = req.reply_parameters(
                    ReplyParameters::new(MessageId(reply_to)).allow_sending_without_reply(),
                );
            }
            if let Some(control) = &message.control {
                req = req.reply_markup(InlineKeyboardMarkup::new(vec![vec![
                    InlineKeyboardButton::callback(control.label.clone(), control.token.clone()),
                ]]));
            }
            req.await
                .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
        })
        .await
        .map(|_| ())
        .map_err(|e| TransportError::Send(e.to_string()))
    }
}

/// Maps a Telegram chat to a [`ChatKind`]. Channels are not supported.
#[must_use]
pub fn chat_kind(chat: &Chat) -> Option<ChatKind> {
    if chat.is_private() {
        Some(ChatKind::Direct)
    } else if chat.is_group() || chat.is_supergroup() {
        Some(ChatKind::Group)
    } else {
        None
    }
}

/// Builds an event from a text message. Returns `None` for non-text
/// messages, anonymous senders and channel posts.
#[must_use]
pub fn event_from_message(msg: &Message) -> Option<InboundEvent> {
    let text = msg.text()?;
    let user = msg.from.as_ref()?;
    let kind = chat_kind(&msg.chat)?;

    Some(
        InboundEvent::message(msg.chat.id.0, user.id.0.cast_signed(), kind, text)
            .with_message_id(msg.id.0),
    )
}

/// Builds an interaction event from an inline button press
#[must_use]
pub fn event_from_callback(q: &CallbackQuery) -> Option<InboundEvent> {
    let data = q.data.as_deref()?;
    let chat = q.message.as_ref()?.chat();
    let kind = chat_kind(chat)?;

    Some(InboundEvent::interaction(
        chat.id.0,
        q.from.id.0.cast_signed(),
        kind,
        data,
    ))
}

async fn handle_message(
    msg: Message,
    router: Arc<ConversationRouter>,
) -> Result<(), teloxide::RequestError> {
    if let Some(event) = event_from_message(&msg) {
        if let Err(e) = router.handle(event).await {
            error!("Message handler error: {e}");
        }
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    router: Arc<ConversationRouter>,
) -> Result<(), teloxide::RequestError> {
    // Stops the client-side spinner on the button.
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!("Failed to answer callback query: {e}");
    }

    if let Some(event) = event_from_callback(&q) {
        if let Err(e) = router.handle(event).await {
            error!("Callback handler error: {e}");
        }
    }
    respond(())
}

/// Dispatcher handler tree. Expects an `Arc<ConversationRouter>` dependency.
#[must_use]
pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(Update::filter_message().endpoint(handle_message))
}
