use super::{LlmError, LlmProvider};
use crate::http_utils::{self, extract_text_content, send_json_request};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Default Gemini endpoint
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// LLM provider implementation for Google Gemini
pub struct GeminiProvider {
    http_client: HttpClient,
    api_key: String,
    api_base: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider instance
    #[must_use]
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            http_client: http_utils::create_http_client(timeout),
            api_key,
            api_base: GEMINI_API_BASE.to_string(),
        }
    }

    /// Point the provider at another base URL (proxies, tests)
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate_text(
        &self,
        prompt: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1beta/models/{model_id}:generateContent?key={}",
            self.api_base, self.api_key
        );

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "temperature": 1.0,
                "maxOutputTokens": max_tokens
            }
        });

        let res_json = send_json_request(&self.http_client, &url, &body, None).await?;

        if let Some(reason) = res_json
            .pointer("/promptFeedback/blockReason")
            .and_then(|v| v.as_str())
        {
            return Err(LlmError::ApiError(format!("Prompt blocked: {reason}")));
        }

        let text = extract_text_content(
            &res_json,
            &["candidates", "0", "content", "parts", "0", "text"],
        )
        .ok_or(LlmError::EmptyResponse)?;

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        debug!(model = model_id, chars = text.len(), "Gemini response parsed");
        Ok(text)
    }
}
