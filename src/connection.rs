//! Connection handling
//!
//! A connection represents one producing or consuming process. It is
//! registered in the store under a collision-resistant name and keeps a
//! heartbeat key alive; once the heartbeat expires, an external cleaner may
//! reclaim every unacked delivery the connection held. Queues are opened
//! through the connection so that their per-connection keys (unacked list,
//! consumer set) are scoped to it.

use crate::config::ConnectionConfig;
use crate::error::StoreResult;
use crate::keys;
use crate::queue::Queue;
use crate::stats::{self, Stats};
use crate::store::{check, RedisStore, Store};

use rand::{distr::Alphanumeric, Rng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Generate an internal name of the form `<tag>-<6 random alphanumerics>`,
/// collision-resistant across process restarts and concurrent holders of
/// the same tag.
pub(crate) fn generate_name(tag: &str) -> String {
    let token: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{tag}-{token}")
}

struct Heartbeat {
    stopped: Arc<AtomicBool>,
}

/// One process's handle on the store
pub struct Connection {
    name: String,
    heartbeat_key: String,
    store: Arc<dyn Store>,
    config: ConnectionConfig,
    heartbeat: Option<Heartbeat>,
}

impl Connection {
    /// Open a connection against the Redis server in `config`.
    pub async fn open(tag: &str, config: ConnectionConfig) -> StoreResult<Self> {
        let store = Arc::new(RedisStore::connect(&config.url).await?);
        Self::open_with_store(tag, store, config).await
    }

    /// Open a connection on an existing store adapter. This is how tests
    /// run against [`MemoryStore`](crate::store::MemoryStore) and how
    /// alternative backends plug in.
    pub async fn open_with_store(
        tag: &str,
        store: Arc<dyn Store>,
        config: ConnectionConfig,
    ) -> StoreResult<Self> {
        let name = generate_name(tag);
        let heartbeat_key = keys::connection_heartbeat_key(&name);

        store.sadd(keys::CONNECTIONS_KEY, &name).await?;
        // first beat up front, so the connection is immediately alive
        store
            .set_ex(&heartbeat_key, &beat_value(), config.heartbeat_ttl)
            .await?;

        let stopped = Arc::new(AtomicBool::new(false));
        spawn_heartbeat(
            Arc::clone(&store),
            heartbeat_key.clone(),
            config.clone(),
            Arc::clone(&stopped),
        );

        tracing::debug!(connection = %name, "opened connection");
        Ok(Self {
            name,
            heartbeat_key,
            store,
            config,
            heartbeat: Some(Heartbeat { stopped }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Open (or re-open) the named queue on this connection.
    pub async fn open_queue(&self, name: &str) -> Queue {
        check(
            "open queue",
            self.store.sadd(keys::QUEUES_KEY, name).await,
        );
        Queue::new(name, &self.name, Arc::clone(&self.store))
    }

    /// Whether this connection's heartbeat key currently exists.
    pub async fn check(&self) -> StoreResult<bool> {
        self.store.exists(&self.heartbeat_key).await
    }

    /// Stop refreshing the heartbeat and delete the heartbeat key, making
    /// this connection eligible for cleaning. Returns whether the key was
    /// removed.
    pub async fn stop_heartbeat(&self) -> bool {
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.stopped.store(true, Ordering::Relaxed);
        }
        check(
            "stop heartbeat",
            self.store.del(&self.heartbeat_key).await,
        ) > 0
    }

    /// Stop the heartbeat and remove this connection from the registry.
    pub async fn close(&self) -> bool {
        self.stop_heartbeat().await;
        check(
            "close connection",
            self.store.srem(keys::CONNECTIONS_KEY, &self.name).await,
        ) > 0
    }

    /// Names of all registered connections.
    pub async fn connections(&self) -> StoreResult<Vec<String>> {
        self.store.smembers(keys::CONNECTIONS_KEY).await
    }

    /// Names of all open queues.
    pub async fn open_queues(&self) -> StoreResult<Vec<String>> {
        self.store.smembers(keys::QUEUES_KEY).await
    }

    /// Collect a stats snapshot covering every open queue.
    pub async fn collect_stats(&self) -> StoreResult<Stats> {
        let queue_names = self.open_queues().await?;
        stats::collect_stats(self.store.as_ref(), &queue_names).await
    }

    /// A queue view on this connection that skips the open-queue
    /// registration, for sweeps over queues that are already open.
    pub(crate) fn hijack_queue(&self, name: &str) -> Queue {
        Queue::new(name, &self.name, Arc::clone(&self.store))
    }

    /// A heartbeat-less view of another process's connection, used by the
    /// cleaner to inspect and reclaim its state.
    pub(crate) fn hijack(&self, name: &str) -> Connection {
        Connection {
            name: name.to_string(),
            heartbeat_key: keys::connection_heartbeat_key(name),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            heartbeat: None,
        }
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[connection {}]", self.name)
    }
}

fn beat_value() -> String {
    chrono::Utc::now().timestamp().to_string()
}

fn spawn_heartbeat(
    store: Arc<dyn Store>,
    heartbeat_key: String,
    config: ConnectionConfig,
    stopped: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(config.heartbeat_interval).await;
            if stopped.load(Ordering::Relaxed) {
                return;
            }
            if let Err(err) = store
                .set_ex(&heartbeat_key, &beat_value(), config.heartbeat_ttl)
                .await
            {
                tracing::warn!(%err, key = %heartbeat_key, "failed to refresh heartbeat");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_generate_name_shape() {
        let name = generate_name("worker");
        let (tag, token) = name.rsplit_once('-').unwrap();
        assert_eq!(tag, "worker");
        assert_eq!(token.len(), 6);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_name_is_unique_enough() {
        let a = generate_name("worker");
        let b = generate_name("worker");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_open_registers_and_beats() {
        let store = Arc::new(MemoryStore::new());
        let connection =
            Connection::open_with_store("test", store.clone(), ConnectionConfig::default())
                .await
                .unwrap();

        let registered = store.smembers(keys::CONNECTIONS_KEY).await.unwrap();
        assert_eq!(registered, vec![connection.name().to_string()]);
        assert!(connection.check().await.unwrap());
    }

    #[tokio::test]
    async fn test_stop_heartbeat_removes_key() {
        let store = Arc::new(MemoryStore::new());
        let connection =
            Connection::open_with_store("test", store, ConnectionConfig::default())
                .await
                .unwrap();

        assert!(connection.stop_heartbeat().await);
        assert!(!connection.check().await.unwrap());
        // a second stop finds nothing to delete
        assert!(!connection.stop_heartbeat().await);
    }

    #[tokio::test]
    async fn test_close_unregisters() {
        let store = Arc::new(MemoryStore::new());
        let connection =
            Connection::open_with_store("test", store, ConnectionConfig::default())
                .await
                .unwrap();

        assert!(connection.close().await);
        assert!(connection.connections().await.unwrap().is_empty());
    }
}
