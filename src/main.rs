use dotenvy::dotenv;
use keyword_reply_bot::bot::telegram::{schema, TelegramOutbox};
use keyword_reply_bot::bot::{Command, ConversationRouter, SessionTable};
use keyword_reply_bot::config::Settings;
use keyword_reply_bot::health;
use keyword_reply_bot::storage::KeywordStore;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting the bot token from logs
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let output = self.token1.replace_all(input, "$1[TELEGRAM_TOKEN]$3");
        let output = self.token2.replace_all(&output, "[TELEGRAM_TOKEN]");
        self.token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.inner.write_all(self.patterns.redact(&s).as_bytes())?;
        // Report the original length; the redacted text may differ in size.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: self.patterns.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting Keyword Reply Bot...");

    let settings = init_settings();
    let store = init_store(&settings).await;

    let bot = Bot::new(settings.telegram_token.clone());
    let me = bot.get_me().await?;
    let bot_username = me.user.username.clone().unwrap_or_default();
    info!("Authorized as @{bot_username}.");

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register command menu: {e}");
    }

    let sessions = SessionTable::new(settings.session_ttl_secs, settings.session_max_capacity);
    let mut router = ConversationRouter::new(
        store,
        sessions,
        Arc::new(TelegramOutbox::new(bot.clone())),
        bot_username,
    );
    if let Some(welcome) = &settings.welcome_message {
        router = router.with_welcome_text(welcome.clone());
    }
    let router = Arc::new(router);

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .build();

    if let Some(webhook_url) = &settings.webhook_url {
        let url = webhook_url.parse()?;
        let options = webhooks::Options::new(settings.listen_addr(), url);
        let (update_listener, stop_flag, webhook_routes) =
            webhooks::axum_to_router(bot, options).await?;
        let app = webhook_routes.merge(health::router());

        let tcp = TcpListener::bind(settings.listen_addr()).await?;
        tokio::spawn(async move {
            if let Err(e) = health::serve(tcp, app, stop_flag).await {
                error!("HTTP server error: {e}");
            }
        });

        info!("Bot is running (webhook on {}).", settings.listen_addr());
        dispatcher
            .dispatch_with_listener(
                update_listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;
    } else {
        spawn_health_server(&settings).await;
        info!("Bot is running (long polling)...");
        dispatcher.dispatch().await;
    }

    info!("Bot stopped.");
    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_store(settings: &Settings) -> Arc<KeywordStore> {
    match KeywordStore::load(&settings.keywords_path).await {
        Ok(store) => {
            info!(
                "Keyword store ready with {} keyword(s) from {}.",
                store.len().await,
                store.path().display()
            );
            Arc::new(store)
        }
        Err(e) => {
            // Starting empty here would overwrite the snapshot on the next save.
            error!(
                "Failed to load keywords from {}: {}",
                settings.keywords_path, e
            );
            std::process::exit(1);
        }
    }
}

/// Long polling binds no port of its own, so the health route gets a listener
/// here. A busy port only costs the health route.
async fn spawn_health_server(settings: &Settings) {
    match TcpListener::bind(settings.listen_addr()).await {
        Ok(tcp) => {
            tokio::spawn(async move {
                if let Err(e) = health::serve(tcp, health::router(), std::future::pending()).await {
                    error!("Health server error: {e}");
                }
            });
        }
        Err(e) => warn!(
            "Failed to bind health route on {}: {e}",
            settings.listen_addr()
        ),
    }
}
