//! Error types for rmq
//!
//! The library distinguishes three failure classes: the store's "no such
//! element" sentinel (modelled as `Ok(None)` on pop/move operations, never
//! as an error), operations whose outcome is part of their return value
//! (purge counts, return counts), and unexpected store errors, which are
//! represented by [`StoreError`].

use thiserror::Error;

/// Errors raised by a backing store adapter
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connecting to the store failed
    #[error("failed to connect to store at '{url}': {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// A store operation failed
    #[error("store operation failed: {0}")]
    OperationFailed(String),

    /// Redis error
    #[error("redis error: {0}")]
    Redis(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Redis(err.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
