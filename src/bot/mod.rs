/// Conversation routing and command dispatch
pub mod router;
/// Dialog state and session table
pub mod state;
/// Telegram adapter and dispatcher schema
pub mod telegram;
/// Transport-agnostic event types
pub mod transport;
/// Texts, controls and list formatting
pub mod views;

pub use router::{Command, ConversationRouter};
pub use state::{DialogState, SessionKey, SessionTable};
