//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! transport constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Application settings loaded from config files and environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token (`TELEGRAM_TOKEN`, or `BOT_TOKEN`)
    #[serde(alias = "bot_token")]
    pub telegram_token: String,

    /// Path of the keyword snapshot
    #[serde(default = "default_keywords_path")]
    pub keywords_path: String,

    /// Public URL for webhook delivery. Long polling is used when unset.
    pub webhook_url: Option<String>,

    /// Port for the webhook listener and the health route
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds an untouched dialog survives before it is dropped
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Maximum number of dialogs tracked at once
    #[serde(default = "default_session_max_capacity")]
    pub session_max_capacity: u64,

    /// Custom HTML welcome text for `/start`
    pub welcome_message: Option<String>,
}

fn default_keywords_path() -> String {
    "keywords.json".to_string()
}

const fn default_port() -> u16 {
    10_000
}

const fn default_session_ttl_secs() -> u64 {
    86_400
}

const fn default_session_max_capacity() -> u64 {
    10_000
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use keyword_reply_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP_PORT=8080 ./target/app` would set the `port` key
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Plain environment variables; UPPER_SNAKE_CASE maps to snake_case
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let settings: Self = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values the bot cannot run with
    fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_token.trim().is_empty() {
            return Err(ConfigError::Message("telegram_token is empty".to_string()));
        }
        // A zero idle timeout expires every dialog before its next step.
        if self.session_ttl_secs == 0 {
            return Err(ConfigError::Message(
                "session_ttl_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Address the HTTP server binds to
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

// Telegram API retry configuration
/// Initial backoff for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff between Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4_000;
/// Number of retries after the first failed attempt
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
