/// Command, callback and message handlers
pub mod handlers;
/// User state and dialogue management
pub mod state;
/// Keyboards, texts and screen rendering
pub mod views;
