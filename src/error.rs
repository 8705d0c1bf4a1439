//! Error types for the relay.

use crate::types::RecipientId;
use thiserror::Error;

/// Main error type for relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Channel closed for recipient {0}")]
    ChannelClosed(RecipientId),

    #[error("Channel buffer full for recipient {0}")]
    ChannelFull(RecipientId),

    #[error("Push timed out for recipient {0}")]
    PushTimeout(RecipientId),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl RelayError {
    /// True when the receiving side of the channel is gone for good.
    pub fn is_dead_channel(&self) -> bool {
        matches!(self, RelayError::ChannelClosed(_))
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Serialization(e.to_string())
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
