//! HTTP utilities for the provider clients
//!
//! Common request/response handling shared by the text and image providers.

use bytes::Bytes;
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Longest provider error body kept in an error message
const ERROR_BODY_LIMIT: usize = 500;

/// Transport-level failures of a provider request
#[derive(Debug, Error)]
pub enum HttpError {
    /// Connectivity problem or timeout
    #[error("Network error: {0}")]
    Network(String),
    /// The server answered with a non-success status
    #[error("API error: {status} - {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Cleaned-up error body
        message: String,
    },
    /// The response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Creates an HTTP client with the given request timeout.
///
/// Falls back to a default client if the builder fails, so a bad TLS setup
/// surfaces on the first request instead of at startup.
#[must_use]
pub fn create_http_client(timeout: Duration) -> HttpClient {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Sends a POST request with a JSON body and returns the parsed JSON response.
///
/// # Errors
///
/// Returns `HttpError::Network` on connectivity issues, `HttpError::Status` on
/// non-success status codes, or `HttpError::Decode` if parsing fails.
pub async fn send_json_request(
    client: &HttpClient,
    url: &str,
    body: &Value,
    auth_header: Option<&str>,
) -> Result<Value, HttpError> {
    let response = post_json(client, url, body, auth_header).await?;
    response
        .json()
        .await
        .map_err(|e| HttpError::Decode(e.to_string()))
}

/// Sends a POST request with a JSON body and returns the raw response bytes.
///
/// # Errors
///
/// Same as [`send_json_request`], with `HttpError::Decode` covering body read failures.
pub async fn send_binary_request(
    client: &HttpClient,
    url: &str,
    body: &Value,
    auth_header: Option<&str>,
) -> Result<Bytes, HttpError> {
    let response = post_json(client, url, body, auth_header).await?;
    response
        .bytes()
        .await
        .map_err(|e| HttpError::Decode(e.to_string()))
}

async fn post_json(
    client: &HttpClient,
    url: &str,
    body: &Value,
    auth_header: Option<&str>,
) -> Result<reqwest::Response, HttpError> {
    let mut request = client.post(url).json(body);
    if let Some(auth) = auth_header {
        request = request.header("Authorization", auth);
    }

    let response = request
        .send()
        .await
        .map_err(|e| HttpError::Network(e.without_url().to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(HttpError::Status {
            status: status.as_u16(),
            message: summarize_error_body(status, &error_text),
        });
    }

    Ok(response)
}

/// Shortens an error body for logs and user notices.
///
/// HTML error pages from proxies are replaced by a fixed note, long bodies are truncated.
#[must_use]
pub fn summarize_error_body(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    if is_html {
        format!("{status} (Server returned HTML error page)")
    } else if body.chars().count() > ERROR_BODY_LIMIT {
        format!(
            "{}... (truncated)",
            crate::utils::truncate_str(body, ERROR_BODY_LIMIT)
        )
    } else if body.is_empty() {
        status.to_string()
    } else {
        body.to_string()
    }
}

/// Extracts text content from a JSON response by navigating a path.
///
/// Returns `None` when any segment is missing or the target is not a string.
///
/// # Examples
///
/// ```
/// use research_post_bot::http_utils::extract_text_content;
/// use serde_json::json;
///
/// let response = json!({"candidates": [{"content": {"parts": [{"text": "hi"}]}}]});
/// let text = extract_text_content(&response, &["candidates", "0", "content", "parts", "0", "text"]);
/// assert_eq!(text.as_deref(), Some("hi"));
/// ```
#[must_use]
pub fn extract_text_content(response: &Value, path: &[&str]) -> Option<String> {
    let mut current = response;

    for segment in path {
        current = match segment.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(*segment)?,
        };
    }

    current.as_str().map(ToString::to_string)
}
