//! Topic error types

use std::fmt;

/// Error type for topic/subscription operations.
#[derive(Debug)]
pub enum TopicError {
    /// Broadcast receiver dropped too many messages to keep up (backpressure drop).
    Lagged(u64),
    /// The topic (or the bus) was closed while a subscriber was still receiving.
    ChannelClosed,
}

impl std::error::Error for TopicError {}

impl fmt::Display for TopicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicError::Lagged(n) => write!(f, "receiver lagged by {} messages", n),
            TopicError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl From<tokio::sync::broadcast::error::RecvError> for TopicError {
    fn from(err: tokio::sync::broadcast::error::RecvError) -> Self {
        match err {
            tokio::sync::broadcast::error::RecvError::Closed => TopicError::ChannelClosed,
            tokio::sync::broadcast::error::RecvError::Lagged(n) => TopicError::Lagged(n),
        }
    }
}
