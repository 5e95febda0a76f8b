//! Queue introspection
//!
//! Point-in-time snapshots of queue state assembled from the registries:
//! per queue the ready and rejected lengths, and per registered connection
//! the unacked depth and consumer names. The types serialize, so callers
//! can render or export them however they like.

use crate::error::StoreResult;
use crate::keys;
use crate::store::Store;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// What one connection currently holds on a queue
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStat {
    /// Deliveries this connection is currently consuming
    pub unacked: u64,
    /// Internal names of the consumers registered on this queue
    pub consumers: Vec<String>,
}

/// State of a single queue across all connections
#[derive(Debug, Clone, Serialize)]
pub struct QueueStat {
    /// Deliveries awaiting consumption
    pub ready: u64,
    /// Deliveries rejected by consumers
    pub rejected: u64,
    /// Per-connection unacked/consumer breakdown; connections with neither
    /// are omitted
    pub connections: HashMap<String, ConnectionStat>,
}

impl QueueStat {
    /// Unacked deliveries summed over all connections.
    pub fn unacked(&self) -> u64 {
        self.connections.values().map(|c| c.unacked).sum()
    }
}

/// A snapshot over a set of queues
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub queues: HashMap<String, QueueStat>,
    pub collected_at: DateTime<Utc>,
}

/// Collect a snapshot for the given queues.
pub async fn collect_stats(store: &dyn Store, queue_names: &[String]) -> StoreResult<Stats> {
    let connection_names = store.smembers(keys::CONNECTIONS_KEY).await?;

    let mut queues = HashMap::new();
    for queue_name in queue_names {
        let ready = store.llen(&keys::queue_ready_key(queue_name)).await?;
        let rejected = store.llen(&keys::queue_rejected_key(queue_name)).await?;

        let mut connections = HashMap::new();
        for connection_name in &connection_names {
            let unacked = store
                .llen(&keys::connection_queue_unacked_key(connection_name, queue_name))
                .await?;
            let consumers = store
                .smembers(&keys::connection_queue_consumers_key(
                    connection_name,
                    queue_name,
                ))
                .await?;
            if unacked == 0 && consumers.is_empty() {
                continue;
            }
            connections.insert(connection_name.clone(), ConnectionStat { unacked, consumers });
        }

        queues.insert(
            queue_name.clone(),
            QueueStat {
                ready,
                rejected,
                connections,
            },
        );
    }

    Ok(Stats {
        queues,
        collected_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_collect_stats_empty_queue() {
        let store = MemoryStore::new();
        let stats = collect_stats(&store, &["things".to_string()]).await.unwrap();

        let stat = &stats.queues["things"];
        assert_eq!(stat.ready, 0);
        assert_eq!(stat.rejected, 0);
        assert_eq!(stat.unacked(), 0);
        assert!(stat.connections.is_empty());
    }

    #[tokio::test]
    async fn test_collect_stats_counts_lists() {
        let store = MemoryStore::new();
        store
            .lpush(&keys::queue_ready_key("things"), &[b"a".to_vec(), b"b".to_vec()])
            .await
            .unwrap();
        store
            .lpush(&keys::queue_rejected_key("things"), &[b"c".to_vec()])
            .await
            .unwrap();
        store.sadd(keys::CONNECTIONS_KEY, "conn1").await.unwrap();
        store
            .lpush(
                &keys::connection_queue_unacked_key("conn1", "things"),
                &[b"d".to_vec()],
            )
            .await
            .unwrap();
        store
            .sadd(
                &keys::connection_queue_consumers_key("conn1", "things"),
                "worker-abc123",
            )
            .await
            .unwrap();

        let stats = collect_stats(&store, &["things".to_string()]).await.unwrap();
        let stat = &stats.queues["things"];
        assert_eq!(stat.ready, 2);
        assert_eq!(stat.rejected, 1);
        assert_eq!(stat.unacked(), 1);
        assert_eq!(
            stat.connections["conn1"].consumers,
            vec!["worker-abc123".to_string()]
        );
    }

    #[tokio::test]
    async fn test_stats_serialize() {
        let store = MemoryStore::new();
        let stats = collect_stats(&store, &["things".to_string()]).await.unwrap();
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"things\""));
    }
}
