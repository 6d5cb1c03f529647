//! User-facing texts, controls and list formatting

use crate::bot::transport::InlineControl;
use crate::storage::KeywordEntry;
use crate::utils::truncate_str;

// ─────────────────────────────────────────────────────────────────────────────
// Callback constants
// ─────────────────────────────────────────────────────────────────────────────

/// Callback data of the button that starts the add-keyword dialog
pub const CALLBACK_START_ADD_KEYWORD: &str = "start_add_keyword";

/// Maximum message length for Telegram with safety margin.
/// Telegram's official limit is 4096.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// Longest keyword shown in `/list`, in characters
const LIST_KEYWORD_MAX_CHARS: usize = 100;
/// Longest response shown in `/list`, in characters
const LIST_RESPONSE_MAX_CHARS: usize = 600;

// ─────────────────────────────────────────────────────────────────────────────
// Static texts
// ─────────────────────────────────────────────────────────────────────────────

/// Default welcome text (HTML)
pub const DEFAULT_WELCOME: &str = "Welcome to the <b>Keyword Reply Bot!</b>\n\
    I can help you auto-reply in your Telegram group using keywords.\n\n\
    <b>Tap 'Start' below to add a keyword + link.</b>";

/// Prompt for the keyword of a new pair
pub const PROMPT_KEYWORD: &str = "Please type your keyword:";
/// Re-prompt after a blank keyword
pub const INVALID_KEYWORD: &str = "Keyword cannot be empty. Please type your keyword:";
/// Prompt for the response of a new pair
pub const PROMPT_RESPONSE: &str =
    "Now send the link or message you want to associate with this keyword:";
/// Confirmation after saving a pair
pub const KEYWORD_SAVED: &str = "✅ Your keyword has been saved successfully.";
/// Prompt for the keyword to delete
pub const PROMPT_DELETE: &str = "Type the keyword you want to delete:";
/// Delete target does not exist
pub const KEYWORD_NOT_FOUND: &str = "Keyword not found.";
/// `/list` with an empty store
pub const NO_KEYWORDS: &str = "No keywords saved yet.";
/// `/settings` placeholder
pub const SETTINGS_COMING_SOON: &str = "Settings feature is coming soon...";
/// Generic persistence failure
pub const STORAGE_FAILURE: &str = "⚠️ Something went wrong while saving. Please try again later.";
/// `/cancel` ended a dialog
pub const DIALOG_CANCELLED: &str = "Cancelled.";
/// `/cancel` with nothing to cancel
pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";

/// The button attached to the welcome message
#[must_use]
pub fn start_control() -> InlineControl {
    InlineControl {
        label: "Start".to_string(),
        token: CALLBACK_START_ADD_KEYWORD.to_string(),
    }
}

/// Confirmation after deleting `keyword` (HTML)
#[must_use]
pub fn keyword_removed(keyword: &str) -> String {
    format!(
        "✅ Keyword <code>{}</code> removed.",
        html_escape::encode_text(keyword)
    )
}

/// Renders stored entries as HTML messages, split to fit Telegram limits.
///
/// Returns an empty vector for an empty list.
#[must_use]
pub fn render_keyword_list(entries: &[KeywordEntry]) -> Vec<String> {
    if entries.is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut current = String::from("<b>Stored Keywords:</b>");
    for entry in entries {
        let line = format!(
            "➤ <code>{}</code> → {}",
            html_escape::encode_text(&shorten(&entry.keyword, LIST_KEYWORD_MAX_CHARS)),
            html_escape::encode_text(&shorten(&entry.response, LIST_RESPONSE_MAX_CHARS))
        );
        // Shortened lines fit the limit even when fully escaped.
        if current.chars().count() + 1 + line.chars().count() > TELEGRAM_MESSAGE_LIMIT {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push('\n');
        }
        current.push_str(&line);
    }
    parts.push(current);
    parts
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}…", truncate_str(text, max_chars))
    }
}
