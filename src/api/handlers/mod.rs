//! API request handlers.

/// Liveness handler.
pub mod health;
/// Search and streaming search handlers.
pub mod search;
