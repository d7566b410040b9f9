//! Error types for cache tier operations.
//!
//! These errors never leave the [`CacheService`](crate::CacheService): the facade
//! turns every one of them into a miss (reads) or a no-op (writes and deletes).
//! They are public so that alternative [`RemoteStore`](crate::RemoteStore)
//! implementations can report failures.

/// Errors produced by a cache tier.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The remote store is disconnected, reconnecting, or has given up reconnecting.
    /// Calls fail fast with this error without touching the network.
    #[error("Remote store unavailable")]
    Unavailable,

    /// The operation did not complete within the configured timeout.
    #[error("Remote store operation timed out after {millis}ms")]
    Timeout {
        /// Timeout that elapsed, in milliseconds.
        millis: u64,
    },

    /// A connection could not be obtained from the pool.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// The store rejected or failed a command.
    #[error("Command error: {message}")]
    Command {
        /// Description of the command failure.
        message: String,
    },

    /// A value could not be serialized to, or parsed from, JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Command` error.
    #[must_use]
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    /// Returns `true` for errors that mean the store could not be reached at all,
    /// as opposed to a reachable store failing a single command.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Unavailable | Self::Timeout { .. } | Self::Connection { .. }
        )
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
            Self::connection(e.to_string())
        } else if e.is_timeout() {
            Self::Timeout { millis: 0 }
        } else {
            Self::command(e.to_string())
        }
    }
}

/// Result type for cache tier operations.
pub type CacheResult<T> = Result<T, CacheError>;
