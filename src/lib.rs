#![deny(missing_docs)]
//! Keyword Reply Bot
//!
//! A Telegram bot that lets group administrators register keyword → response
//! pairs through a short dialog and answers matching group messages
//! automatically.

/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// HTTP health route for hosting platforms
pub mod health;
/// Keyword storage (JSON snapshot)
pub mod storage;
/// Test doubles for the transport layer
pub mod testing;
/// Shared helpers
pub mod utils;
