//! Telegram UI components
//!
//! Contains keyboards, text messages and the rendering of controller screens.

use crate::config::{TELEGRAM_CAPTION_LIMIT, TELEGRAM_MESSAGE_LIMIT};
use crate::controller::{CallbackAction, FlowError, Platform, PromptChoice, Screen};
use crate::search::SearchError;
use crate::session::SearchResult;
use crate::utils::{ellipsize, html_to_plain, truncate_str};
use bytes::Bytes;
use reqwest::Url;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use thiserror::Error;

/// Characters of a result title shown on its link button
const BUTTON_TITLE_CHARS: usize = 20;
/// Characters of a result title shown in the results list
const LIST_TITLE_CHARS: usize = 100;
/// Characters of the draft pre-filled into the share link
const SHARE_TEXT_CHARS: usize = 200;

const TWITTER_INTENT_URL: &str = "https://twitter.com/intent/tweet";
const INSTAGRAM_URL: &str = "https://www.instagram.com/";

// ─────────────────────────────────────────────────────────────────────────────
// Texts
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for bot text rendering
///
/// Provides the fixed messages and notices of the search-to-post flow.
pub trait FlowView {
    /// Reply to /start and /help
    fn welcome_message() -> &'static str;
    /// Placeholder shown while searching
    fn searching() -> &'static str;
    /// Usage hint for /search without a query
    fn search_usage() -> &'static str;
    /// Prompt above the platform buttons
    fn platform_prompt() -> &'static str;
    /// Prompt above the thumbnail buttons
    fn thumbnail_prompt() -> &'static str;
    /// Ask the user to describe the thumbnail
    fn describe_image() -> &'static str;
    /// Caption of the finished thumbnail
    fn post_ready() -> &'static str;
    /// Reply to non-command text outside of a prompt request
    fn use_search_hint() -> &'static str;
    /// Reply to /clear
    fn session_cleared(existed: bool) -> &'static str;
    /// Toast for callback data this bot never emits
    fn unknown_command() -> &'static str;
    /// Notice for anything unexpected inside a handler
    fn unexpected_error() -> &'static str;
    /// Short-lived toast while a callback is processed
    fn progress_toast(action: CallbackAction) -> Option<&'static str>;
    /// Notice for a failed step
    fn notice(err: &FlowError) -> &'static str;
    /// Notice for a screen Telegram would reject
    fn render_too_large() -> &'static str;
}

/// Default English implementation of `FlowView`
pub struct DefaultFlowView;

impl FlowView for DefaultFlowView {
    fn welcome_message() -> &'static str {
        "👋 <b>Research to post</b>\n\n\
         Send <code>/search your topic</code>. I will search the web, draft posts for \
         Twitter, Instagram and LinkedIn from the results, and make a thumbnail for them."
    }

    fn searching() -> &'static str {
        "🔍 Searching the web..."
    }

    fn search_usage() -> &'static str {
        "⚠️ Please provide a search query. Usage: /search [your query]"
    }

    fn platform_prompt() -> &'static str {
        "Select the platform for which you want to generate content:"
    }

    fn thumbnail_prompt() -> &'static str {
        "Choose an option for image generation:"
    }

    fn describe_image() -> &'static str {
        "✏️ Describe the image you want. Your description is combined with the generated post."
    }

    fn post_ready() -> &'static str {
        "<b>Your post is ready!</b>"
    }

    fn use_search_hint() -> &'static str {
        "Use /search [your query] to start."
    }

    fn session_cleared(existed: bool) -> &'static str {
        if existed {
            "🗑 Search session cleared."
        } else {
            "Nothing to clear."
        }
    }

    fn unknown_command() -> &'static str {
        "⚠️ Unknown command"
    }

    fn unexpected_error() -> &'static str {
        "⚠️ An unexpected error occurred. Please try again."
    }

    fn progress_toast(action: CallbackAction) -> Option<&'static str> {
        match action {
            CallbackAction::Platform(_) => Some("✍️ Generating content..."),
            CallbackAction::Regenerate => Some("🔄 Regenerating..."),
            CallbackAction::ThumbnailPrompt(PromptChoice::Default) => {
                Some("🖼️ Creating thumbnail...")
            }
            CallbackAction::Generate
            | CallbackAction::CreateThumbnail
            | CallbackAction::ThumbnailPrompt(PromptChoice::Custom) => None,
        }
    }

    fn notice(err: &FlowError) -> &'static str {
        match err {
            FlowError::Search(SearchError::EmptyQuery) => Self::search_usage(),
            FlowError::Search(SearchError::NoResults) => {
                "⚠️ No relevant results found. Try a different query."
            }
            FlowError::Search(SearchError::Unavailable(_)) => {
                "⚠️ Search failed. Please try again later."
            }
            FlowError::GenerationFailed(_) => "⚠️ Content generation failed",
            FlowError::ImageUnavailable(_) => "⚠️ Image generation failed",
            FlowError::SessionExpired => "❌ Session expired. Start a new search.",
            FlowError::ContentMissing => "❌ No content available. Generate content first.",
            FlowError::Store(_) => Self::unexpected_error(),
        }
    }

    fn render_too_large() -> &'static str {
        "⚠️ Message too long. Try regenerating or a different query."
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyboards
// ─────────────────────────────────────────────────────────────────────────────

fn callback_button(text: &str, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_data())
}

/// One link button per result with a parseable URL, then the "generate" button
#[must_use]
pub fn results_keyboard(results: &[SearchResult]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = results
        .iter()
        .filter_map(|res| {
            let url = Url::parse(&res.url).ok()?;
            let title = if res.title.trim().is_empty() {
                "No Title"
            } else {
                res.title.as_str()
            };
            Some(vec![InlineKeyboardButton::url(
                format!("🌐 {}", ellipsize(title, BUTTON_TITLE_CHARS)),
                url,
            )])
        })
        .collect();

    rows.push(vec![callback_button(
        "✅ Generate Content",
        CallbackAction::Generate,
    )]);
    InlineKeyboardMarkup::new(rows)
}

/// Platform choice buttons
#[must_use]
pub fn platform_keyboard() -> InlineKeyboardMarkup {
    let row = Platform::ALL
        .into_iter()
        .map(|platform| {
            let icon = match platform {
                Platform::Twitter => "🐦",
                Platform::Instagram => "📸",
                Platform::LinkedIn => "🔗",
            };
            callback_button(
                &format!("{icon} {}", platform.label()),
                CallbackAction::Platform(platform),
            )
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(vec![row])
}

/// Regenerate / post buttons under a draft
#[must_use]
pub fn content_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        callback_button("🔄 Regenerate", CallbackAction::Regenerate),
        callback_button("📤 Post", CallbackAction::CreateThumbnail),
    ]])
}

/// Default / custom prompt buttons
#[must_use]
pub fn thumbnail_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        callback_button(
            "🖼️ Default Prompt",
            CallbackAction::ThumbnailPrompt(PromptChoice::Default),
        ),
        callback_button(
            "🖼️ Custom Prompt",
            CallbackAction::ThumbnailPrompt(PromptChoice::Custom),
        ),
    ]])
}

/// Sharing links under the finished thumbnail
#[must_use]
pub fn share_keyboard(content: &str) -> InlineKeyboardMarkup {
    let mut row = Vec::new();
    let snippet = ellipsize(content.trim(), SHARE_TEXT_CHARS);
    if let Ok(url) = Url::parse_with_params(TWITTER_INTENT_URL, &[("text", snippet.as_str())]) {
        row.push(InlineKeyboardButton::url("🐦 Twitter", url));
    }
    if let Ok(url) = Url::parse(INSTAGRAM_URL) {
        row.push(InlineKeyboardButton::url("📸 Instagram", url));
    }
    InlineKeyboardMarkup::new(vec![row])
}

// ─────────────────────────────────────────────────────────────────────────────
// Screen rendering
// ─────────────────────────────────────────────────────────────────────────────

/// A screen Telegram cannot display
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    /// Visible text exceeds the Telegram limit
    #[error("Rendered text has {len} characters, limit is {limit}")]
    TooLarge {
        /// Visible characters of the rendered text
        len: usize,
        /// Limit that applies to this kind of message
        limit: usize,
    },
}

/// Telegram-ready form of a [`Screen`]
#[derive(Debug, Clone)]
pub enum Rendered {
    /// HTML text with an optional inline keyboard
    Text {
        /// HTML body
        text: String,
        /// Buttons under the message
        keyboard: Option<InlineKeyboardMarkup>,
    },
    /// Photo with HTML caption
    Photo {
        /// Encoded image
        image: Bytes,
        /// HTML caption
        caption: String,
        /// Buttons under the photo
        keyboard: InlineKeyboardMarkup,
    },
}

/// HTML list of results with linked titles
#[must_use]
pub fn results_text(results: &[SearchResult]) -> String {
    let items = results
        .iter()
        .map(|res| {
            format!(
                "• <a href=\"{}\">{}</a>",
                html_escape::encode_double_quoted_attribute(&res.url),
                html_escape::encode_text(&ellipsize(&res.title, LIST_TITLE_CHARS))
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("<b>Web Search Results:</b>\n{items}")
}

/// HTML body of a generated draft
#[must_use]
pub fn content_text(platform: Option<Platform>, text: &str, revised: bool) -> String {
    let heading = match (revised, platform) {
        (true, _) => "Revised Content".to_string(),
        (false, Some(platform)) => format!("Generated Content ({})", platform.label()),
        (false, None) => "Generated Content".to_string(),
    };
    format!(
        "<b>{heading}:</b>\n\n{}",
        html_escape::encode_text(text.trim())
    )
}

/// Character count Telegram applies to an HTML message: tags removed, entities decoded
#[must_use]
pub fn visible_len(html: &str) -> usize {
    html_to_plain(html).chars().count()
}

fn ensure_fits(html: &str, limit: usize) -> Result<(), RenderError> {
    let len = visible_len(html);
    if len > limit {
        return Err(RenderError::TooLarge { len, limit });
    }
    Ok(())
}

/// Turn a controller screen into Telegram text or photo.
///
/// # Errors
///
/// Returns `RenderError::TooLarge` when the text or caption would exceed Telegram limits.
pub fn render<V: FlowView>(screen: &Screen) -> Result<Rendered, RenderError> {
    let rendered = match screen {
        Screen::SearchResults { results, .. } => Rendered::Text {
            text: results_text(results),
            keyboard: Some(results_keyboard(results)),
        },
        Screen::PlatformMenu => Rendered::Text {
            text: V::platform_prompt().to_string(),
            keyboard: Some(platform_keyboard()),
        },
        Screen::Content {
            platform,
            text,
            revised,
        } => Rendered::Text {
            text: content_text(*platform, text, *revised),
            keyboard: Some(content_keyboard()),
        },
        Screen::ThumbnailMenu => Rendered::Text {
            text: V::thumbnail_prompt().to_string(),
            keyboard: Some(thumbnail_keyboard()),
        },
        Screen::AwaitingImagePrompt => Rendered::Text {
            text: V::describe_image().to_string(),
            keyboard: None,
        },
        Screen::Thumbnail { image, content } => Rendered::Photo {
            image: image.clone(),
            caption: V::post_ready().to_string(),
            keyboard: share_keyboard(content),
        },
    };

    match &rendered {
        Rendered::Text { text, .. } => ensure_fits(text, TELEGRAM_MESSAGE_LIMIT)?,
        Rendered::Photo { caption, .. } => ensure_fits(caption, TELEGRAM_CAPTION_LIMIT)?,
    }
    Ok(rendered)
}

/// Shortened version of a notice for callback answers (Telegram allows 200 characters)
#[must_use]
pub fn toast(text: &str) -> String {
    truncate_str(text, 200)
}
