//! Content generation from search results
//!
//! Builds the research context and one of two prompt templates, then makes a
//! single call to the text provider.

use super::{LlmError, LlmProvider};
use crate::config::{CONTEXT_CHAR_BUDGET, GENERATION_MAX_TOKENS};
use crate::session::SearchResult;
use crate::utils::truncate_str;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Which prompt template to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// First draft, formatted per platform
    Initial,
    /// Rewrite of the same context in a different style
    Regenerate,
}

/// Generates social media drafts from stored search results
pub struct ContentGenerator {
    provider: Arc<dyn LlmProvider>,
    model_id: String,
}

impl ContentGenerator {
    /// Create a generator that calls `model_id` on `provider`
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
        }
    }

    /// Generate a draft for `results` with the template selected by `mode`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` if the provider call fails or yields no text.
    pub async fn generate(
        &self,
        results: &[SearchResult],
        mode: GenerationMode,
    ) -> Result<String, LlmError> {
        let context = build_context(results);
        let prompt = build_prompt(mode, &context);

        debug!(
            mode = ?mode,
            sources = results.len(),
            context_chars = context.chars().count(),
            prompt_chars = prompt.chars().count(),
            "Sending generation prompt"
        );

        let started = Instant::now();
        let result = self
            .provider
            .generate_text(&prompt, &self.model_id, GENERATION_MAX_TOKENS)
            .await;
        let duration_ms = started.elapsed().as_millis();

        match result {
            Ok(text) if !text.trim().is_empty() => {
                info!(
                    mode = ?mode,
                    duration_ms = duration_ms,
                    chars = text.chars().count(),
                    "Content generated"
                );
                Ok(text)
            }
            Ok(_) => {
                warn!(mode = ?mode, duration_ms = duration_ms, "Model returned empty text");
                Err(LlmError::EmptyResponse)
            }
            Err(e) => {
                warn!(mode = ?mode, duration_ms = duration_ms, error = %e, "Content generation failed");
                Err(e)
            }
        }
    }
}

/// Joins result snippets under `Source N` labels, cut to the context budget.
///
/// # Examples
///
/// ```
/// use research_post_bot::llm::generator::build_context;
/// use research_post_bot::session::SearchResult;
///
/// let results = vec![SearchResult {
///     title: "t".into(),
///     url: "https://example.com".into(),
///     content: "Rust is fast".into(),
/// }];
/// assert_eq!(build_context(&results), "Source 1:\nRust is fast");
/// ```
#[must_use]
pub fn build_context(results: &[SearchResult]) -> String {
    let joined = results
        .iter()
        .enumerate()
        .map(|(i, res)| format!("Source {}:\n{}", i + 1, res.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_str(joined, CONTEXT_CHAR_BUDGET)
}

/// Wraps an already truncated context in the template for `mode`
#[must_use]
pub fn build_prompt(mode: GenerationMode, context: &str) -> String {
    match mode {
        GenerationMode::Initial => format!(
            "Create engaging social media content based on these research findings:\n\
             \n\
             {context}\n\
             \n\
             Format for these platforms:\n\
             1. Twitter: 280-character post with 3 relevant hashtags\n\
             2. Instagram: Caption under 2200 chars with 5 emojis\n\
             3. LinkedIn: Professional post under 3000 chars with key insights\n\
             \n\
             Structure with clear platform headings. Ensure factual accuracy."
        ),
        GenerationMode::Regenerate => format!(
            "Regenerate the social media content with a different style:\n\
             \n\
             Original context:\n\
             {context}\n\
             \n\
             Requirements:\n\
             - More casual/informal tone\n\
             - Use different emojis/hashtags\n\
             - Alternative structure\n\
             - Keep platform-specific formatting"
        ),
    }
}
