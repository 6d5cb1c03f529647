//! Conversation router
//!
//! Turns inbound events into command handling, dialog steps or keyword
//! auto-replies. Independent of Telegram: everything goes out through an
//! [`Outbox`].

use crate::bot::state::{DialogState, SessionKey, SessionTable};
use crate::bot::transport::{ChatKind, InboundEvent, Outbox, OutboundMessage, TransportError};
use crate::bot::views;
use crate::storage::{normalize_keyword, KeywordStore};
use std::sync::Arc;
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info};

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message with the add-keyword button
    #[command(description = "Start the bot")]
    Start,
    /// Show stored keywords
    #[command(description = "View all keywords")]
    List,
    /// Start the delete dialog
    #[command(description = "Delete a keyword")]
    Remove,
    /// Settings placeholder
    #[command(description = "Bot settings")]
    Settings,
    /// Abort the dialog in progress
    #[command(description = "Cancel the current step")]
    Cancel,
}

/// Routes inbound events for all chats.
///
/// Holds the keyword store, the dialog session table and the outbox. Cheap to
/// share behind an `Arc`.
pub struct ConversationRouter {
    store: Arc<KeywordStore>,
    sessions: SessionTable,
    outbox: Arc<dyn Outbox>,
    bot_username: String,
    welcome_text: String,
}

impl ConversationRouter {
    /// Creates a router. `bot_username` is used to recognize commands
    /// addressed as `/list@bot_username`.
    #[must_use]
    pub fn new(
        store: Arc<KeywordStore>,
        sessions: SessionTable,
        outbox: Arc<dyn Outbox>,
        bot_username: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sessions,
            outbox,
            bot_username: bot_username.into(),
            welcome_text: views::DEFAULT_WELCOME.to_string(),
        }
    }

    /// Replaces the HTML welcome text sent on `/start`
    #[must_use]
    pub fn with_welcome_text(mut self, welcome_text: impl Into<String>) -> Self {
        self.welcome_text = welcome_text.into();
        self
    }

    /// The keyword store this router writes to
    #[must_use]
    pub fn store(&self) -> &Arc<KeywordStore> {
        &self.store
    }

    /// Current dialog state of `user_id` in `chat_id`
    pub async fn dialog_state(&self, chat_id: i64, user_id: i64) -> DialogState {
        self.sessions.get(SessionKey::new(chat_id, user_id)).await
    }

    /// Handles one inbound event.
    ///
    /// Dialog transitions happen before anything is sent, so a delivery
    /// failure never leaves a session half-advanced.
    ///
    /// # Errors
    ///
    /// Returns an error only if an outbound message could not be delivered.
    /// Storage failures are reported to the user instead.
    pub async fn handle(&self, event: InboundEvent) -> Result<(), TransportError> {
        let key = SessionKey::new(event.chat_id, event.user_id);

        if let Some(token) = event.interaction.as_deref() {
            return self.handle_interaction(&event, key, token).await;
        }

        if let Ok(command) = Command::parse(&event.text, &self.bot_username) {
            return self.handle_command(&event, key, command).await;
        }

        match self.sessions.get(key).await {
            DialogState::Idle => self.auto_reply(&event).await,
            DialogState::AwaitingKeyword => self.receive_keyword(&event, key).await,
            DialogState::AwaitingResponse { keyword } => {
                self.receive_response(&event, key, &keyword).await
            }
            DialogState::AwaitingDeleteTarget => self.receive_delete_target(&event, key).await,
        }
    }

    async fn handle_command(
        &self,
        event: &InboundEvent,
        key: SessionKey,
        command: Command,
    ) -> Result<(), TransportError> {
        info!(
            "User {} in chat {} issued {:?}.",
            event.user_id, event.chat_id, command
        );

        match command {
            Command::Start => {
                self.sessions.exit(key).await;
                self.send(
                    OutboundMessage::html(event.chat_id, self.welcome_text.clone())
                        .with_control(views::start_control()),
                )
                .await
            }
            Command::List => {
                let parts = views::render_keyword_list(&self.store.list().await);
                if parts.is_empty() {
                    return self.send_text(event.chat_id, views::NO_KEYWORDS).await;
                }
                for part in parts {
                    self.send(OutboundMessage::html(event.chat_id, part)).await?;
                }
                Ok(())
            }
            Command::Remove => {
                self.sessions
                    .update(key, DialogState::AwaitingDeleteTarget)
                    .await;
                self.send_text(event.chat_id, views::PROMPT_DELETE).await
            }
            Command::Settings => {
                self.send_text(event.chat_id, views::SETTINGS_COMING_SOON)
                    .await
            }
            Command::Cancel => {
                let text = if self.sessions.exit(key).await == DialogState::Idle {
                    views::NOTHING_TO_CANCEL
                } else {
                    views::DIALOG_CANCELLED
                };
                self.send_text(event.chat_id, text).await
            }
        }
    }

    async fn handle_interaction(
        &self,
        event: &InboundEvent,
        key: SessionKey,
        token: &str,
    ) -> Result<(), TransportError> {
        if token != views::CALLBACK_START_ADD_KEYWORD {
            debug!("Ignoring unknown interaction token '{token}'.");
            return Ok(());
        }

        info!(
            "User {} in chat {} started adding a keyword.",
            event.user_id, event.chat_id
        );
        self.sessions.update(key, DialogState::AwaitingKeyword).await;
        self.send_text(event.chat_id, views::PROMPT_KEYWORD).await
    }

    async fn auto_reply(&self, event: &InboundEvent) -> Result<(), TransportError> {
        if event.chat_kind != ChatKind::Group {
            return Ok(());
        }

        let Some(response) = self.store.get(&event.text).await else {
            return Ok(());
        };

        debug!(
            "Keyword '{}' matched in chat {}.",
            normalize_keyword(&event.text),
            event.chat_id
        );
        self.send(OutboundMessage::text(event.chat_id, response).reply_to(event.message_id))
            .await
    }

    async fn receive_keyword(
        &self,
        event: &InboundEvent,
        key: SessionKey,
    ) -> Result<(), TransportError> {
        let keyword = normalize_keyword(&event.text);
        if keyword.is_empty() {
            return self.send_text(event.chat_id, views::INVALID_KEYWORD).await;
        }

        self.sessions
            .update(key, DialogState::AwaitingResponse { keyword })
            .await;
        self.send_text(event.chat_id, views::PROMPT_RESPONSE).await
    }

    async fn receive_response(
        &self,
        event: &InboundEvent,
        key: SessionKey,
        keyword: &str,
    ) -> Result<(), TransportError> {
        self.sessions.exit(key).await;

        match self.store.set(keyword, &event.text).await {
            Ok(_) => self.send_text(event.chat_id, views::KEYWORD_SAVED).await,
            Err(e) => {
                error!("Failed to save keyword '{keyword}': {e}");
                self.send_text(event.chat_id, views::STORAGE_FAILURE).await
            }
        }
    }

    async fn receive_delete_target(
        &self,
        event: &InboundEvent,
        key: SessionKey,
    ) -> Result<(), TransportError> {
        self.sessions.exit(key).await;

        let keyword = normalize_keyword(&event.text);
        match self.store.delete(&keyword).await {
            Ok(true) => {
                self.send(OutboundMessage::html(
                    event.chat_id,
                    views::keyword_removed(&keyword),
                ))
                .await
            }
            Ok(false) => self.send_text(event.chat_id, views::KEYWORD_NOT_FOUND).await,
            Err(e) => {
                error!("Failed to delete keyword '{keyword}': {e}");
                self.send_text(event.chat_id, views::STORAGE_FAILURE).await
            }
        }
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        self.send(OutboundMessage::text(chat_id, text)).await
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        self.outbox.send(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::transport::{MessageFormat, MockOutbox};
    use tempfile::TempDir;

    const GROUP: i64 = -1001;
    const ALICE: i64 = 11;
    const BOB: i64 = 22;

    async fn router_with(outbox: MockOutbox) -> (TempDir, ConversationRouter) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = KeywordStore::load(dir.path().join("keywords.json"))
            .await
            .expect("load");
        let router = ConversationRouter::new(
            Arc::new(store),
            SessionTable::default(),
            Arc::new(outbox),
            "keyword_bot",
        );
        (dir, router)
    }

    fn expect_text(outbox: &mut MockOutbox, text: &'static str) {
        outbox
            .expect_send()
            .withf(move |m| m.text == text)
            .times(1)
            .returning(|_| Ok(()));
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("/list", "keyword_bot").ok(), Some(Command::List));
        assert_eq!(
            Command::parse("/remove@keyword_bot", "keyword_bot").ok(),
            Some(Command::Remove)
        );
        assert!(Command::parse("/remove@other_bot", "keyword_bot").is_err());
        assert!(Command::parse("list", "keyword_bot").is_err());
    }

    #[test]
    fn test_command_menu_lists_all_commands() {
        let names: Vec<String> = Command::bot_commands()
            .into_iter()
            .map(|c| c.command.trim_start_matches('/').to_string())
            .collect();
        assert_eq!(names, ["start", "list", "remove", "settings", "cancel"]);
    }

    #[tokio::test]
    async fn test_start_sends_control() {
        let mut outbox = MockOutbox::new();
        outbox
            .expect_send()
            .withf(|m| {
                m.format == MessageFormat::Html
                    && m.control
                        .as_ref()
                        .is_some_and(|c| c.token == views::CALLBACK_START_ADD_KEYWORD)
            })
            .times(1)
            .returning(|_| Ok(()));
        let (_dir, router) = router_with(outbox).await;

        router
            .handle(InboundEvent::message(ALICE, ALICE, ChatKind::Direct, "/start"))
            .await
            .expect("handle");
    }

    #[tokio::test]
    async fn test_start_resets_dialog() {
        let mut outbox = MockOutbox::new();
        outbox.expect_send().returning(|_| Ok(()));
        let (_dir, router) = router_with(outbox).await;

        router
            .handle(InboundEvent::message(GROUP, ALICE, ChatKind::Group, "/remove"))
            .await
            .expect("handle");
        assert_eq!(
            router.dialog_state(GROUP, ALICE).await,
            DialogState::AwaitingDeleteTarget
        );

        router
            .handle(InboundEvent::message(GROUP, ALICE, ChatKind::Group, "/start"))
            .await
            .expect("handle");
        assert_eq!(router.dialog_state(GROUP, ALICE).await, DialogState::Idle);
    }

    #[tokio::test]
    async fn test_blank_keyword_reprompts() {
        let mut outbox = MockOutbox::new();
        expect_text(&mut outbox, views::PROMPT_KEYWORD);
        expect_text(&mut outbox, views::INVALID_KEYWORD);
        let (_dir, router) = router_with(outbox).await;

        router
            .handle(InboundEvent::interaction(
                ALICE,
                ALICE,
                ChatKind::Direct,
                views::CALLBACK_START_ADD_KEYWORD,
            ))
            .await
            .expect("handle");
        router
            .handle(InboundEvent::message(ALICE, ALICE, ChatKind::Direct, "   "))
            .await
            .expect("handle");

        assert_eq!(
            router.dialog_state(ALICE, ALICE).await,
            DialogState::AwaitingKeyword
        );
        assert!(router.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_interaction_is_ignored() {
        let mut outbox = MockOutbox::new();
        outbox.expect_send().times(0);
        let (_dir, router) = router_with(outbox).await;

        router
            .handle(InboundEvent::interaction(GROUP, ALICE, ChatKind::Group, "bogus"))
            .await
            .expect("handle");
        assert_eq!(router.dialog_state(GROUP, ALICE).await, DialogState::Idle);
    }

    #[tokio::test]
    async fn test_command_overrides_pending_response() {
        let mut outbox = MockOutbox::new();
        outbox.expect_send().returning(|_| Ok(()));
        let (_dir, router) = router_with(outbox).await;

        router
            .handle(InboundEvent::interaction(
                GROUP,
                ALICE,
                ChatKind::Group,
                views::CALLBACK_START_ADD_KEYWORD,
            ))
            .await
            .expect("handle");
        router
            .handle(InboundEvent::message(GROUP, ALICE, ChatKind::Group, "promo"))
            .await
            .expect("handle");
        router
            .handle(InboundEvent::message(GROUP, ALICE, ChatKind::Group, "/remove"))
            .await
            .expect("handle");

        assert_eq!(
            router.dialog_state(GROUP, ALICE).await,
            DialogState::AwaitingDeleteTarget
        );
        assert!(router.store().get("promo").await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_reports_state() {
        let mut outbox = MockOutbox::new();
        expect_text(&mut outbox, views::NOTHING_TO_CANCEL);
        expect_text(&mut outbox, views::PROMPT_DELETE);
        expect_text(&mut outbox, views::DIALOG_CANCELLED);
        let (_dir, router) = router_with(outbox).await;

        for text in ["/cancel", "/remove", "/cancel"] {
            router
                .handle(InboundEvent::message(GROUP, BOB, ChatKind::Group, text))
                .await
                .expect("handle");
        }
        assert_eq!(router.dialog_state(GROUP, BOB).await, DialogState::Idle);
    }

    #[tokio::test]
    async fn test_dialog_does_not_leak_between_users() {
        let mut outbox = MockOutbox::new();
        outbox.expect_send().returning(|_| Ok(()));
        let (_dir, router) = router_with(outbox).await;
        router.store().set("promo", "join now").await.expect("set");

        router
            .handle(InboundEvent::message(GROUP, ALICE, ChatKind::Group, "/remove"))
            .await
            .expect("handle");
        // Bob's message is an ordinary group message, not Alice's delete target.
        router
            .handle(InboundEvent::message(GROUP, BOB, ChatKind::Group, "promo"))
            .await
            .expect("handle");

        assert_eq!(
            router.store().get("promo").await.as_deref(),
            Some("join now")
        );
        assert_eq!(
            router.dialog_state(GROUP, ALICE).await,
            DialogState::AwaitingDeleteTarget
        );
        assert_eq!(router.dialog_state(GROUP, BOB).await, DialogState::Idle);
    }

    #[tokio::test]
    async fn test_auto_reply_is_threaded() {
        let mut outbox = MockOutbox::new();
        outbox
            .expect_send()
            .withf(|m| m.text == "join now" && m.reply_to == Some(42) && m.control.is_none())
            .times(1)
            .returning(|_| Ok(()));
        let (_dir, router) = router_with(outbox).await;
        router.store().set("promo", "join now").await.expect("set");

        router
            .handle(InboundEvent::message(GROUP, BOB, ChatKind::Group, " Promo ").with_message_id(42))
            .await
            .expect("handle");
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported_and_dialog_ends() {
        let mut outbox = MockOutbox::new();
        expect_text(&mut outbox, views::PROMPT_KEYWORD);
        expect_text(&mut outbox, views::PROMPT_RESPONSE);
        expect_text(&mut outbox, views::STORAGE_FAILURE);
        let (_dir, router) = router_with(outbox).await;

        // A non-empty directory at the snapshot path makes every save fail.
        let path = router.store().path().to_path_buf();
        std::fs::create_dir(&path).expect("mkdir");
        std::fs::write(path.join("blocker"), "x").expect("write");

        router
            .handle(InboundEvent::interaction(
                ALICE,
                ALICE,
                ChatKind::Direct,
                views::CALLBACK_START_ADD_KEYWORD,
            ))
            .await
            .expect("handle");
        router
            .handle(InboundEvent::message(ALICE, ALICE, ChatKind::Direct, "promo"))
            .await
            .expect("handle");
        router
            .handle(InboundEvent::message(ALICE, ALICE, ChatKind::Direct, "join now"))
            .await
            .expect("handle");

        assert_eq!(router.dialog_state(ALICE, ALICE).await, DialogState::Idle);
        assert!(router.store().get("promo").await.is_none());
    }

    #[tokio::test]
    async fn test_delete_storage_failure_is_reported_and_dialog_ends() {
        let mut outbox = MockOutbox::new();
        expect_text(&mut outbox, views::PROMPT_DELETE);
        expect_text(&mut outbox, views::STORAGE_FAILURE);
        let (_dir, router) = router_with(outbox).await;

        router
            .store()
            .set("promo", "join now")
            .await
            .expect("set");

        let path = router.store().path().to_path_buf();
        std::fs::remove_file(&path).expect("remove snapshot");
        std::fs::create_dir(&path).expect("mkdir");
        std::fs::write(path.join("blocker"), "x").expect("write");

        router
            .handle(InboundEvent::message(ALICE, ALICE, ChatKind::Direct, "/remove"))
            .await
            .expect("handle");
        router
            .handle(InboundEvent::message(ALICE, ALICE, ChatKind::Direct, "promo"))
            .await
            .expect("handle");

        assert_eq!(router.dialog_state(ALICE, ALICE).await, DialogState::Idle);
        assert_eq!(
            router.store().get("promo").await.as_deref(),
            Some("join now")
        );
    }

    #[tokio::test]
    async fn test_send_failure_still_advances_dialog() {
        let mut outbox = MockOutbox::new();
        outbox
            .expect_send()
            .times(1)
            .returning(|_| Err(TransportError::Send("network down".to_string())));
        let (_dir, router) = router_with(outbox).await;

        let result = router
            .handle(InboundEvent::message(GROUP, ALICE, ChatKind::Group, "/remove"))
            .await;

        assert!(result.is_err());
        assert_eq!(
            router.dialog_state(GROUP, ALICE).await,
            DialogState::AwaitingDeleteTarget
        );
    }
}
