//! Dialog state and the per-(chat, user) session table

use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

/// Represents the current step of a user's dialog with the bot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DialogState {
    /// No dialog in progress
    #[default]
    Idle,
    /// Waiting for the keyword of a new pair
    AwaitingKeyword,
    /// Waiting for the response to store under `keyword`
    AwaitingResponse {
        /// Normalized keyword typed in the previous step
        keyword: String,
    },
    /// Waiting for the keyword to delete
    AwaitingDeleteTarget,
}

/// Identity of a dialog session: one user inside one chat
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct SessionKey {
    /// Telegram chat ID
    pub chat_id: i64,
    /// Telegram user ID
    pub user_id: i64,
}

impl SessionKey {
    /// Creates a key for `user_id` in `chat_id`
    #[must_use]
    pub const fn new(chat_id: i64, user_id: i64) -> Self {
        Self { chat_id, user_id }
    }
}

/// Table of in-progress dialogs.
///
/// Only non-idle states are stored. Entries not touched for the configured
/// idle time are evicted, which is how abandoned dialogs disappear.
#[derive(Clone)]
pub struct SessionTable {
    cache: Cache<SessionKey, DialogState>,
}

impl SessionTable {
    /// Creates a table with the given idle TTL and capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use keyword_reply_bot::bot::state::SessionTable;
    ///
    /// let sessions = SessionTable::new(86_400, 10_000);
    /// ```
    #[must_use]
    pub fn new(idle_ttl_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_idle(Duration::from_secs(idle_ttl_secs))
            .build();
        Self { cache }
    }

    /// Current state of the session, [`DialogState::Idle`] if none
    pub async fn get(&self, key: SessionKey) -> DialogState {
        self.cache.get(&key).await.unwrap_or_default()
    }

    /// Moves the session to `state`. Moving to `Idle` destroys the session.
    pub async fn update(&self, key: SessionKey, state: DialogState) {
        debug!(
            "Session {}:{} -> {:?}",
            key.chat_id, key.user_id, state
        );
        if state == DialogState::Idle {
            self.cache.invalidate(&key).await;
        } else {
            self.cache.insert(key, state).await;
        }
    }

    /// Ends the session. Returns the state it was in.
    pub async fn exit(&self, key: SessionKey) -> DialogState {
        let previous = self.cache.remove(&key).await.unwrap_or_default();
        debug!("Session {}:{} exited from {:?}", key.chat_id, key.user_id, previous);
        previous
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new(86_400, 10_000)
    }
}
