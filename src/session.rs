//! Per-chat search sessions
//!
//! A session is created by a successful search and read by every later step of the
//! generate / regenerate / thumbnail flow. The store is a trait so the in-memory
//! implementation can be swapped for a shared one without touching the controller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur in a session store backend
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// The backing store could not complete the operation
    #[error("Session backend error: {0}")]
    Backend(String),
}

/// A single web search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Page title
    pub title: String,
    /// Page URL
    pub url: String,
    /// Content snippet returned by the search provider
    pub content: String,
}

/// Last search of a chat plus the most recent generated text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Search results in provider order
    pub results: Vec<SearchResult>,
    /// Query the results were produced for
    pub query: String,
    /// Most recently generated text, if any
    pub content: Option<String>,
    /// Time of the last mutation
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session for a completed search, without generated content
    #[must_use]
    pub fn new(query: impl Into<String>, results: Vec<SearchResult>) -> Self {
        Self {
            results,
            query: query.into(),
            content: None,
            updated_at: Utc::now(),
        }
    }

    /// Generated content, ignoring blank text
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Interface for session storage backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get the session of a chat
    async fn get(&self, chat_id: i64) -> Result<Option<Session>, SessionStoreError>;
    /// Store a session, replacing any previous one for the chat
    async fn put(&self, chat_id: i64, session: Session) -> Result<(), SessionStoreError>;
    /// Remove the session of a chat. Returns whether one existed.
    async fn delete(&self, chat_id: i64) -> Result<bool, SessionStoreError>;
    /// Replace the generated content of an existing session.
    /// Returns `false` when the chat has no session.
    async fn set_content(&self, chat_id: i64, content: String)
        -> Result<bool, SessionStoreError>;
}

/// In-process session store backed by a moka cache.
///
/// Entries have no TTL; they only leave the cache through `delete` or capacity
/// eviction, which the flow reports as an expired session.
pub struct InMemorySessionStore {
    cache: Cache<i64, Session>,
}

impl InMemorySessionStore {
    /// Create a store holding at most `capacity` chats
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(capacity).build(),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, chat_id: i64) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.cache.get(&chat_id).await)
    }

    async fn put(&self, chat_id: i64, session: Session) -> Result<(), SessionStoreError> {
        debug!(
            chat_id = chat_id,
            results = session.results.len(),
            "Storing session"
        );
        self.cache.insert(chat_id, session).await;
        Ok(())
    }

    async fn delete(&self, chat_id: i64) -> Result<bool, SessionStoreError> {
        Ok(self.cache.remove(&chat_id).await.is_some())
    }

    async fn set_content(
        &self,
        chat_id: i64,
        content: String,
    ) -> Result<bool, SessionStoreError> {
        let result = self
            .cache
            .entry(chat_id)
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(entry) => {
                        let mut session = entry.into_value();
                        session.content = Some(content);
                        session.updated_at = Utc::now();
                        Op::Put(session)
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        Ok(matches!(result, CompResult::ReplacedWith(_)))
    }
}
