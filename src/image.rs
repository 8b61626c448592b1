//! Image generation for post thumbnails
//!
//! The Hugging Face inference API returns the image body directly; bytes are
//! passed through untouched.

use crate::http_utils::{self, send_binary_request, HttpError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client as HttpClient;
use serde_json::json;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Errors returned by image providers
#[derive(Debug, Error)]
pub enum ImageError {
    /// The provider answered with a non-success status
    #[error("Image API returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Cleaned-up error body
        message: String,
    },
    /// Transport failure or timeout
    #[error("Image API unreachable: {0}")]
    Network(String),
    /// The provider returned an empty body
    #[error("Image API returned no data")]
    EmptyPayload,
}

impl From<HttpError> for ImageError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Status { status, message } => Self::Status { status, message },
            HttpError::Network(msg) | HttpError::Decode(msg) => Self::Network(msg),
        }
    }
}

/// Interface for image generation providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Render an image for `prompt` and return the encoded bytes
    async fn generate_image(&self, prompt: &str) -> Result<Bytes, ImageError>;
}

/// Image provider calling a Hugging Face hosted text-to-image model
pub struct HuggingFaceImageProvider {
    http_client: HttpClient,
    api_token: String,
    model_url: String,
}

impl HuggingFaceImageProvider {
    /// Create a provider for `model_url` with a per-request `timeout`
    #[must_use]
    pub fn new(api_token: String, model_url: String, timeout: Duration) -> Self {
        Self {
            http_client: http_utils::create_http_client(timeout),
            api_token,
            model_url,
        }
    }
}

#[async_trait]
impl ImageProvider for HuggingFaceImageProvider {
    async fn generate_image(&self, prompt: &str) -> Result<Bytes, ImageError> {
        let auth = format!("Bearer {}", self.api_token);
        let body = json!({ "inputs": prompt });

        let started = Instant::now();
        let result =
            send_binary_request(&self.http_client, &self.model_url, &body, Some(&auth)).await;
        let duration_ms = started.elapsed().as_millis();

        match result {
            Ok(bytes) if bytes.is_empty() => {
                warn!(duration_ms = duration_ms, "Image API returned an empty body");
                Err(ImageError::EmptyPayload)
            }
            Ok(bytes) => {
                info!(duration_ms = duration_ms, bytes = bytes.len(), "Image generated");
                Ok(bytes)
            }
            Err(e) => {
                warn!(duration_ms = duration_ms, error = %e, "Image generation failed");
                Err(e.into())
            }
        }
    }
}
