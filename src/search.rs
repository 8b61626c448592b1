//! Search Gateway - web search with result normalization
//!
//! Wraps the Tavily SDK behind [`SearchProvider`] and applies the session cap.

use crate::config::{
    MAX_SEARCH_RESULTS, TAVILY_REQUEST_RESULTS, TAVILY_SEARCH_DEPTH, TAVILY_TIMEOUT_SECS,
};
use crate::session::SearchResult;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tavily::Tavily;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors returned by the search gateway
#[derive(Debug, Error)]
pub enum SearchError {
    /// The query was blank
    #[error("Empty search query")]
    EmptyQuery,
    /// The provider call failed or timed out
    #[error("Search unavailable: {0}")]
    Unavailable(String),
    /// The provider answered with zero results
    #[error("No results found")]
    NoResults,
}

/// Interface for web search providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run a deep search and return results in provider order
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

/// Search provider backed by the Tavily API
pub struct TavilySearch {
    client: Tavily,
    api_key: String,
}

impl TavilySearch {
    /// Create a new Tavily provider with the given API key
    ///
    /// # Errors
    ///
    /// Returns an error if the Tavily client cannot be created.
    pub fn new(api_key: &str) -> Result<Self> {
        let client = Tavily::builder(api_key)
            .timeout(Duration::from_secs(TAVILY_TIMEOUT_SECS))
            .max_retries(0)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create Tavily client: {e}"))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let request = tavily::SearchRequest::new(&self.api_key, query)
            .max_results(TAVILY_REQUEST_RESULTS)
            .search_depth(TAVILY_SEARCH_DEPTH);

        let response = self
            .client
            .call(&request)
            .await
            .map_err(|e| SearchError::Unavailable(e.to_string()))?;

        Ok(response
            .results
            .into_iter()
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                content: r.content,
            })
            .collect())
    }
}

/// Validates queries, calls the provider once and caps the result list
pub struct SearchGateway {
    provider: Arc<dyn SearchProvider>,
    max_results: usize,
}

impl SearchGateway {
    /// Create a gateway keeping at most [`MAX_SEARCH_RESULTS`] results
    #[must_use]
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            provider,
            max_results: MAX_SEARCH_RESULTS,
        }
    }

    /// Search the web for `query`.
    ///
    /// # Errors
    ///
    /// `EmptyQuery` for a blank query (no provider call), `Unavailable` when the
    /// provider fails, `NoResults` when it finds nothing.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let started = Instant::now();
        let outcome = self.provider.search(query).await;
        let duration_ms = started.elapsed().as_millis();

        let mut results = match outcome {
            Ok(results) => results,
            Err(e) => {
                warn!(query = %query, duration_ms = duration_ms, error = %e, "Search failed");
                return Err(e);
            }
        };

        if results.is_empty() {
            info!(query = %query, duration_ms = duration_ms, "Search returned no results");
            return Err(SearchError::NoResults);
        }

        results.truncate(self.max_results);

        info!(
            query = %query,
            duration_ms = duration_ms,
            results = results.len(),
            "Search completed"
        );
        if let Some(first) = results.first() {
            debug!(
                title = %first.title,
                url = %first.url,
                content_chars = first.content.chars().count(),
                "First search result"
            );
        }

        Ok(results)
    }
}
