//! Conversation Controller
//!
//! Sequences search, generation and thumbnail steps against the per-chat session.
//! Every entry point returns the [`Screen`] to render or a [`FlowError`] to turn
//! into a notice; nothing here talks to Telegram.

/// Callback payload enumeration
pub mod actions;

pub use actions::{CallbackAction, Platform, PromptChoice, UnknownCallback};

use crate::config::IMAGE_PROMPT_CHAR_BUDGET;
use crate::image::{ImageError, ImageProvider};
use crate::llm::{ContentGenerator, GenerationMode, LlmError};
use crate::search::{SearchError, SearchGateway};
use crate::session::{SearchResult, Session, SessionStore, SessionStoreError};
use crate::utils::truncate_str;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// What the transport should show after a step
#[derive(Debug, Clone)]
pub enum Screen {
    /// Result links plus the "generate" button
    SearchResults {
        /// Query that produced the results
        query: String,
        /// Results in provider order
        results: Vec<SearchResult>,
    },
    /// Platform choice buttons
    PlatformMenu,
    /// Generated draft plus regenerate / post buttons
    Content {
        /// Platform picked by the user, absent for regenerated drafts
        platform: Option<Platform>,
        /// Draft text, verbatim from the model
        text: String,
        /// Whether this is a regenerated draft
        revised: bool,
    },
    /// Default / custom prompt buttons
    ThumbnailMenu,
    /// Ask the user to type an image description
    AwaitingImagePrompt,
    /// Finished thumbnail plus sharing links
    Thumbnail {
        /// Encoded image as returned by the provider
        image: Bytes,
        /// Draft the thumbnail was made for
        content: String,
    },
}

/// Reasons a step could not run
#[derive(Debug, Error)]
pub enum FlowError {
    /// Search failed, found nothing, or had no query
    #[error(transparent)]
    Search(#[from] SearchError),
    /// Text provider failed or returned nothing
    #[error("Content generation failed: {0}")]
    GenerationFailed(#[from] LlmError),
    /// Image provider failed
    #[error("Image generation failed: {0}")]
    ImageUnavailable(#[from] ImageError),
    /// No session exists for the chat
    #[error("No active session for this chat")]
    SessionExpired,
    /// The session has no generated content yet
    #[error("No generated content in session")]
    ContentMissing,
    /// The session store failed
    #[error("Session store error: {0}")]
    Store(#[from] SessionStoreError),
}

/// Default thumbnail prompt for a draft
#[must_use]
pub fn default_image_prompt(content: &str) -> String {
    format!(
        "Social media thumbnail image for: {}",
        truncate_str(content, IMAGE_PROMPT_CHAR_BUDGET)
    )
}

/// Thumbnail prompt led by a user-written description
#[must_use]
pub fn custom_image_prompt(description: &str, content: &str) -> String {
    format!(
        "{}. Social media thumbnail image for: {}",
        truncate_str(description.trim(), IMAGE_PROMPT_CHAR_BUDGET),
        truncate_str(content, IMAGE_PROMPT_CHAR_BUDGET)
    )
}

/// Command and callback dispatcher for the search-to-post flow
pub struct Controller {
    sessions: Arc<dyn SessionStore>,
    search: SearchGateway,
    generator: ContentGenerator,
    images: Arc<dyn ImageProvider>,
}

impl Controller {
    /// Wire the controller to its collaborators
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        search: SearchGateway,
        generator: ContentGenerator,
        images: Arc<dyn ImageProvider>,
    ) -> Self {
        Self {
            sessions,
            search,
            generator,
            images,
        }
    }

    /// Handle `/search <query>`.
    ///
    /// A successful search replaces the chat's session. Failures leave any
    /// previous session untouched.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Search` for blank queries, provider failures and empty results.
    pub async fn search(&self, chat_id: i64, query: &str) -> Result<Screen, FlowError> {
        let query = query.trim();
        info!(chat_id = chat_id, query = %query, "Search requested");

        let results = self.search.search(query).await?;
        self.sessions
            .put(chat_id, Session::new(query, results.clone()))
            .await?;
        info!(chat_id = chat_id, results = results.len(), "Session stored");

        Ok(Screen::SearchResults {
            query: query.to_string(),
            results,
        })
    }

    /// Handle an inline button press.
    ///
    /// # Errors
    ///
    /// `SessionExpired` when the chat has no session, `ContentMissing` for thumbnail
    /// steps before any generation, or the error of the provider that was called.
    pub async fn handle_callback(
        &self,
        chat_id: i64,
        action: CallbackAction,
    ) -> Result<Screen, FlowError> {
        info!(chat_id = chat_id, action = %action, "Callback received");
        let session = self.require_session(chat_id).await?;

        match action {
            CallbackAction::Generate => Ok(Screen::PlatformMenu),
            CallbackAction::Platform(platform) => {
                let text = self
                    .generate(chat_id, &session, GenerationMode::Initial)
                    .await?;
                Ok(Screen::Content {
                    platform: Some(platform),
                    text,
                    revised: false,
                })
            }
            CallbackAction::Regenerate => {
                let text = self
                    .generate(chat_id, &session, GenerationMode::Regenerate)
                    .await?;
                Ok(Screen::Content {
                    platform: None,
                    text,
                    revised: true,
                })
            }
            CallbackAction::CreateThumbnail => {
                require_content(&session)?;
                Ok(Screen::ThumbnailMenu)
            }
            CallbackAction::ThumbnailPrompt(PromptChoice::Default) => {
                let content = require_content(&session)?;
                self.thumbnail(chat_id, default_image_prompt(content), content)
                    .await
            }
            CallbackAction::ThumbnailPrompt(PromptChoice::Custom) => {
                require_content(&session)?;
                Ok(Screen::AwaitingImagePrompt)
            }
        }
    }

    /// Handle the description typed after choosing a custom thumbnail prompt.
    ///
    /// # Errors
    ///
    /// Same guards as the default thumbnail callback.
    pub async fn custom_thumbnail(
        &self,
        chat_id: i64,
        description: &str,
    ) -> Result<Screen, FlowError> {
        let session = self.require_session(chat_id).await?;
        let content = require_content(&session)?;
        self.thumbnail(chat_id, custom_image_prompt(description, content), content)
            .await
    }

    /// Forget the chat's session. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Store` if the store fails.
    pub async fn clear(&self, chat_id: i64) -> Result<bool, FlowError> {
        let existed = self.sessions.delete(chat_id).await?;
        info!(chat_id = chat_id, existed = existed, "Session cleared");
        Ok(existed)
    }

    async fn require_session(&self, chat_id: i64) -> Result<Session, FlowError> {
        self.sessions.get(chat_id).await?.ok_or_else(|| {
            warn!(chat_id = chat_id, "No session found");
            FlowError::SessionExpired
        })
    }

    async fn generate(
        &self,
        chat_id: i64,
        session: &Session,
        mode: GenerationMode,
    ) -> Result<String, FlowError> {
        let text = self.generator.generate(&session.results, mode).await?;
        if !self.sessions.set_content(chat_id, text.clone()).await? {
            // Session disappeared while the model was running
            return Err(FlowError::SessionExpired);
        }
        Ok(text)
    }

    async fn thumbnail(
        &self,
        chat_id: i64,
        prompt: String,
        content: &str,
    ) -> Result<Screen, FlowError> {
        info!(
            chat_id = chat_id,
            prompt = %truncate_str(&prompt, 100),
            "Generating thumbnail"
        );
        let image = self.images.generate_image(&prompt).await?;
        Ok(Screen::Thumbnail {
            image,
            content: content.to_string(),
        })
    }
}

fn require_content(session: &Session) -> Result<&str, FlowError> {
    session.content().ok_or(FlowError::ContentMissing)
}
