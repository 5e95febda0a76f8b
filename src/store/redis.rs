//! Redis-backed store adapter
//!
//! Uses a multiplexed async connection; the handle is cheap to clone and
//! every clone shares one pipelined TCP connection, so each operation
//! clones it instead of locking.

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::time::Duration;

/// Store adapter over a Redis server
#[derive(Debug)]
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    /// Connect to the Redis server at `url`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = Client::open(url).map_err(|e| StoreError::ConnectionFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { connection })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn lpush(&self, key: &str, payloads: &[Vec<u8>]) -> StoreResult<()> {
        if payloads.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        conn.lpush::<_, _, ()>(key, payloads).await?;
        Ok(())
    }

    async fn rpop(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn();
        let value = conn.rpop::<_, Option<Vec<u8>>>(key, None).await?;
        Ok(value)
    }

    async fn rpoplpush(&self, src: &str, dst: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn();
        let value = conn.rpoplpush::<_, _, Option<Vec<u8>>>(src, dst).await?;
        Ok(value)
    }

    async fn llen(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn();
        let len = conn.llen::<_, u64>(key).await?;
        Ok(len)
    }

    async fn del(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn();
        let removed = conn.del::<_, u64>(key).await?;
        Ok(removed)
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<u64> {
        let mut conn = self.conn();
        let added = conn.sadd::<_, _, u64>(key, member).await?;
        Ok(added)
    }

    async fn srem(&self, key: &str, member: &str) -> StoreResult<u64> {
        let mut conn = self.conn();
        let removed = conn.srem::<_, _, u64>(key, member).await?;
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn();
        let members = conn.smembers::<_, Vec<String>>(key).await?;
        Ok(members)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn();
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn();
        let exists = conn.exists::<_, bool>(key).await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Operational tests require a running Redis instance and live in the
    // integration suite behind the MemoryStore; here we only cover
    // connection-failure reporting.

    #[tokio::test]
    async fn test_invalid_url_is_a_connection_error() {
        let err = RedisStore::connect("not-a-redis-url").await.unwrap_err();
        match err {
            StoreError::ConnectionFailed { url, .. } => assert_eq!(url, "not-a-redis-url"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
