//! Configuration and settings management
//!
//! Loads settings from environment variables and defines the fixed limits of the flow.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Maximum number of search results kept in a session
pub const MAX_SEARCH_RESULTS: usize = 25;
/// Number of results requested from Tavily (provider ceiling per request)
pub const TAVILY_REQUEST_RESULTS: i32 = 20;
/// Tavily search depth used for every query
pub const TAVILY_SEARCH_DEPTH: &str = "advanced";
/// Tavily client timeout in seconds
pub const TAVILY_TIMEOUT_SECS: u64 = 30;
/// Character budget for the research context sent to the text model
pub const CONTEXT_CHAR_BUDGET: usize = 5000;
/// Character budget for generated content embedded in an image prompt
pub const IMAGE_PROMPT_CHAR_BUDGET: usize = 500;
/// Telegram hard limit for message text
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;
/// Telegram hard limit for photo captions
pub const TELEGRAM_CAPTION_LIMIT: usize = 1024;
/// Max output tokens requested from the text model
pub const GENERATION_MAX_TOKENS: u32 = 8192;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,
    /// Tavily API key
    pub tavily_api_key: String,
    /// Gemini API key
    pub gemini_api_key: String,
    /// Hugging Face inference API token
    pub hf_api_token: String,

    /// Gemini model used for content generation
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    /// Base URL of the Gemini API
    #[serde(default = "default_gemini_api_base")]
    pub gemini_api_base: String,
    /// Full URL of the image model inference endpoint
    #[serde(default = "default_image_model_url")]
    pub image_model_url: String,

    /// Timeout for text generation requests
    #[serde(default = "default_llm_http_timeout_secs")]
    pub llm_http_timeout_secs: u64,
    /// Timeout for image generation requests
    #[serde(default = "default_image_timeout_secs")]
    pub image_timeout_secs: u64,
    /// Long-poll timeout passed to `getUpdates`
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u32,
    /// Maximum number of chat sessions kept in memory
    #[serde(default = "default_session_capacity")]
    pub session_capacity: u64,
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_image_model_url() -> String {
    "https://api-inference.huggingface.co/models/stabilityai/stable-diffusion-xl-base-1.0"
        .to_string()
}

const fn default_llm_http_timeout_secs() -> u64 {
    60
}

const fn default_image_timeout_secs() -> u64 {
    120
}

const fn default_poll_timeout_secs() -> u32 {
    60
}

const fn default_session_capacity() -> u64 {
    10_000
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use research_post_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required secret is missing or empty.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Not checked into git
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            // ignore_empty treats empty env vars as unset, so an empty secret counts as missing
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let settings: Self = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let secrets = [
            ("telegram_token", &self.telegram_token),
            ("tavily_api_key", &self.tavily_api_key),
            ("gemini_api_key", &self.gemini_api_key),
            ("hf_api_token", &self.hf_api_token),
        ];
        for (key, value) in secrets {
            if value.trim().is_empty() {
                return Err(ConfigError::NotFound(key.to_string()));
            }
        }
        Ok(())
    }

    /// One-line description of the loaded secrets, safe to log
    #[must_use]
    pub fn masked_summary(&self) -> String {
        format!(
            "telegram={} tavily={} gemini={} hf={}",
            mask_secret(&self.telegram_token),
            mask_secret(&self.tavily_api_key),
            mask_secret(&self.gemini_api_key),
            mask_secret(&self.hf_api_token),
        )
    }
}

/// Masks a secret, keeping only its last four characters.
///
/// # Examples
///
/// ```
/// use research_post_bot::config::mask_secret;
/// assert_eq!(mask_secret("abcdef123456"), "****3456");
/// assert_eq!(mask_secret("abc"), "****");
/// ```
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{tail}")
}
