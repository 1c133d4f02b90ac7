//! Notification error types

use thiserror::Error;

/// Errors delivering a chat message
#[derive(Debug, Error)]
pub enum NotificationError {
    /// No chat channel configured
    #[error("Notifications disabled")]
    Disabled,

    /// Network or HTTP failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The chat API rejected the request
    #[error("Chat API error: {0}")]
    Api(String),

    /// Unexpected response shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs carry the bot token
        let err = err.without_url();
        if err.is_decode() {
            NotificationError::InvalidResponse(err.to_string())
        } else {
            NotificationError::Transport(err.to_string())
        }
    }
}
