//! Text generation
//!
//! Provider seam for the text model plus the content generator that turns search
//! results into social media drafts.

/// Prompt assembly and the generate / regenerate entry point
pub mod generator;
/// Implementations of specific LLM providers
pub mod providers;

pub use generator::{ContentGenerator, GenerationMode};

use crate::http_utils::HttpError;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    JsonError(String),
    /// The provider answered without any usable text
    #[error("Empty response from model")]
    EmptyResponse,
}

impl From<HttpError> for LlmError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Network(msg) => Self::NetworkError(msg),
            HttpError::Status { status, message } => {
                Self::ApiError(format!("{status} - {message}"))
            }
            HttpError::Decode(msg) => Self::JsonError(msg),
        }
    }
}

/// Interface for text generation providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate text for a single prompt
    async fn generate_text(
        &self,
        prompt: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}
