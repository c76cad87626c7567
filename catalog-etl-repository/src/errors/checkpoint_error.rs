//! Checkpoint store error types.

use std::time::Duration;

use thiserror::Error;

use super::Retryable;

/// Errors from the durable checkpoint and pending-set store.
#[derive(Debug, Clone, Error)]
pub enum CheckpointError {
    /// Could not reach the store or the connection dropped.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A command did not complete in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The store rejected a command.
    #[error("Command error: {0}")]
    CommandError(String),

    /// A stored checkpoint could not be parsed as a timestamp.
    #[error("Invalid timestamp under key {key}: {value}")]
    InvalidTimestamp { key: String, value: String },
}

impl CheckpointError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a command error.
    pub fn command(msg: impl Into<String>) -> Self {
        Self::CommandError(msg.into())
    }

    /// Create an invalid timestamp error.
    pub fn invalid_timestamp(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Retryable for CheckpointError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::Timeout(_))
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        Self::Timeout(format!("{} did not complete within {:?}", operation, after))
    }
}

impl From<redis::RedisError> for CheckpointError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal()
        {
            Self::ConnectionError(err.to_string())
        } else {
            Self::CommandError(err.to_string())
        }
    }
}
