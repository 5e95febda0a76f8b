//! Store abstraction for queue state
//!
//! All queue state lives in a shared key-value store offering atomic list
//! and set primitives. The [`Store`] trait captures exactly the operations
//! the queue core needs; the default implementation is Redis, and the
//! abstraction leaves room for other backends (the in-process
//! [`MemoryStore`] backs the test suite and embedded use).
//!
//! Pop and move operations distinguish "no such element" (`Ok(None)`) from
//! failure (`Err`). The core treats the former as normal control flow and
//! the latter as unrecoverable: at-least-once delivery tolerates duplicate
//! redelivery after a restart, so the process tears down and lets its
//! supervisor restart it with a clean slate, which an external cleaner
//! recovers. Callers that need graceful degradation instead must install
//! that policy in their own [`Store`] implementation.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use crate::error::StoreResult;
use async_trait::async_trait;
use std::time::Duration;

/// The list and set primitives the queue core is built on
///
/// All operations are atomic on the store side; the client never issues
/// compound transactions.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Atomically prepend one or more payloads to the head of a list.
    ///
    /// With multiple payloads the first element of the slice ends up
    /// deepest in the list, so a later tail pop returns payloads in slice
    /// order (FIFO).
    async fn lpush(&self, key: &str, payloads: &[Vec<u8>]) -> StoreResult<()>;

    /// Remove and return the element at the tail of a list.
    async fn rpop(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Atomically move the tail element of `src` to the head of `dst`.
    async fn rpoplpush(&self, src: &str, dst: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Length of a list (0 for a missing key).
    async fn llen(&self, key: &str) -> StoreResult<u64>;

    /// Delete a key, returning the number of keys removed.
    async fn del(&self, key: &str) -> StoreResult<u64>;

    /// Add a member to a set.
    async fn sadd(&self, key: &str, member: &str) -> StoreResult<u64>;

    /// Remove a member from a set, returning the number removed.
    async fn srem(&self, key: &str, member: &str) -> StoreResult<u64>;

    /// All members of a set.
    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Set a string value with an expiry.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Whether a key currently exists.
    async fn exists(&self, key: &str) -> StoreResult<bool>;
}

/// Unwrap a store result, aborting the process on failure.
///
/// Unexpected store errors leave the queue state unknowable; the process
/// exits with a diagnostic and relies on supervised restart plus the
/// external cleaner for recovery.
pub(crate) fn check<T>(operation: &str, result: StoreResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(%err, operation, "unrecoverable store error, aborting");
            std::process::abort();
        }
    }
}
