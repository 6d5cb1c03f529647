//! Testing helpers.
//!
//! Provides an [`Outbox`] that records messages instead of sending them, for
//! driving the router without a live transport.

use crate::bot::transport::{Outbox, OutboundMessage, TransportError};
use async_trait::async_trait;
use std::sync::Mutex;

/// Outbox that keeps every message it is asked to send.
///
/// # Example
///
/// ```rust
/// use keyword_reply_bot::testing::RecordingOutbox;
///
/// let outbox = RecordingOutbox::default();
/// assert!(outbox.take().is_empty());
/// ```
#[derive(Default)]
pub struct RecordingOutbox {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingOutbox {
    /// Returns and clears the recorded messages
    #[must_use]
    pub fn take(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .map(|mut sent| std::mem::take(&mut *sent))
            .unwrap_or_default()
    }
}

#[async_trait]
impl Outbox for RecordingOutbox {
    async fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        self.sent
            .lock()
            .map_err(|e| TransportError::Send(e.to_string()))?
            .push(message);
        Ok(())
    }
}
