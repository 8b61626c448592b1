//! Research-to-post Telegram bot
//!
//! Searches the web for a topic, drafts social media posts from the results and
//! renders a thumbnail for the chosen draft.

/// Telegram transport: handlers, dialogue state and views
pub mod bot;
/// Configuration and settings
pub mod config;
/// Conversation flow over the per-chat session
pub mod controller;
/// Shared HTTP helpers for provider clients
pub mod http_utils;
/// Thumbnail generation
pub mod image;
/// Text generation
pub mod llm;
/// Web search
pub mod search;
/// Per-chat session storage
pub mod session;
/// Text helpers
pub mod utils;
