//! Inline button payloads
//!
//! Every callback the bot can emit is a [`CallbackAction`]. Raw strings are parsed
//! once at the transport boundary; the controller only ever sees this enum.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Callback data for the "generate" button under search results
pub const CALLBACK_GENERATE: &str = "generate_content";
/// Callback data prefix for platform buttons
pub const CALLBACK_PLATFORM_PREFIX: &str = "platform_";
/// Callback data for regenerating content
pub const CALLBACK_REGENERATE: &str = "regenerate";
/// Callback data for the "post" button, which opens the thumbnail menu
pub const CALLBACK_CREATE_THUMBNAIL: &str = "create_thumbnail";
/// Callback data for a thumbnail from the default prompt
pub const CALLBACK_DEFAULT_PROMPT: &str = "default_prompt";
/// Callback data for a thumbnail from a user-written prompt
pub const CALLBACK_CUSTOM_PROMPT: &str = "custom_prompt";

/// Target social network for a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Short-form post with hashtags
    Twitter,
    /// Medium-form caption with emoji
    Instagram,
    /// Long-form professional post
    LinkedIn,
}

impl Platform {
    /// All platforms in menu order
    pub const ALL: [Self; 3] = [Self::Twitter, Self::Instagram, Self::LinkedIn];

    /// Identifier used in callback data
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Instagram => "instagram",
            Self::LinkedIn => "linkedin",
        }
    }

    /// Human readable name
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Twitter => "Twitter",
            Self::Instagram => "Instagram",
            Self::LinkedIn => "LinkedIn",
        }
    }

    fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.slug() == slug)
    }
}

/// How the thumbnail prompt is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    /// Built from the generated content only
    Default,
    /// The user types a description first
    Custom,
}

/// Every inline button the bot emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Show the platform menu
    Generate,
    /// Generate the first draft
    Platform(Platform),
    /// Rewrite the draft in a different style
    Regenerate,
    /// Show the thumbnail prompt menu
    CreateThumbnail,
    /// Produce the thumbnail
    ThumbnailPrompt(PromptChoice),
}

/// Callback data that does not belong to this bot
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown callback data: {0}")]
pub struct UnknownCallback(pub String);

impl CallbackAction {
    /// Serialize to Telegram callback data
    #[must_use]
    pub fn to_data(self) -> String {
        match self {
            Self::Generate => CALLBACK_GENERATE.to_string(),
            Self::Platform(platform) => format!("{CALLBACK_PLATFORM_PREFIX}{}", platform.slug()),
            Self::Regenerate => CALLBACK_REGENERATE.to_string(),
            Self::CreateThumbnail => CALLBACK_CREATE_THUMBNAIL.to_string(),
            Self::ThumbnailPrompt(PromptChoice::Default) => CALLBACK_DEFAULT_PROMPT.to_string(),
            Self::ThumbnailPrompt(PromptChoice::Custom) => CALLBACK_CUSTOM_PROMPT.to_string(),
        }
    }
}

impl FromStr for CallbackAction {
    type Err = UnknownCallback;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data {
            CALLBACK_GENERATE => Ok(Self::Generate),
            CALLBACK_REGENERATE => Ok(Self::Regenerate),
            CALLBACK_CREATE_THUMBNAIL => Ok(Self::CreateThumbnail),
            CALLBACK_DEFAULT_PROMPT => Ok(Self::ThumbnailPrompt(PromptChoice::Default)),
            CALLBACK_CUSTOM_PROMPT => Ok(Self::ThumbnailPrompt(PromptChoice::Custom)),
            other => other
                .strip_prefix(CALLBACK_PLATFORM_PREFIX)
                .and_then(Platform::from_slug)
                .map(Self::Platform)
                .ok_or_else(|| UnknownCallback(other.to_string())),
        }
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_data())
    }
}
