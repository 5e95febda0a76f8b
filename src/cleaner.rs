//! Dead-connection cleanup
//!
//! Consumer processes that die keep their unacked deliveries parked under
//! their connection's keys. The cleaner walks the connection registry,
//! treats a missing heartbeat key as proof of death, returns every unacked
//! delivery of the dead connection to its queue's ready list and removes
//! the leftover per-connection keys. Running it periodically from any
//! process is what makes crash-restart recovery whole.

use crate::connection::Connection;
use crate::error::StoreResult;
use crate::keys;

/// Sweeps stale connections' state back into the ready lists
pub struct Cleaner {
    connection: Connection,
}

impl Cleaner {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Clean all dead connections, returning the number of deliveries
    /// moved back to ready lists.
    ///
    /// Registry traversal errors are returned so the sweep can be retried;
    /// the per-queue moves themselves follow the queue's fatal-on-error
    /// policy.
    pub async fn clean(&self) -> StoreResult<u64> {
        let mut returned_total = 0;

        for name in self.connection.connections().await? {
            if name == self.connection.name() {
                continue;
            }
            let hijacked = self.connection.hijack(&name);
            if hijacked.check().await? {
                continue; // still beating
            }
            returned_total += self.clean_connection(&hijacked).await?;
        }

        Ok(returned_total)
    }

    async fn clean_connection(&self, dead: &Connection) -> StoreResult<u64> {
        let store = self.connection.store();
        let queues_key = keys::connection_queues_key(dead.name());

        let mut returned = 0;
        for queue_name in store.smembers(&queues_key).await? {
            let queue = dead.hijack_queue(&queue_name);
            let moved = queue.return_all_unacked().await;
            queue.close_in_connection().await;
            if moved > 0 {
                tracing::debug!(
                    connection = dead.name(),
                    queue = queue_name,
                    moved,
                    "returned unacked deliveries"
                );
            }
            returned += moved;
        }

        store.del(&queues_key).await?;
        store.srem(keys::CONNECTIONS_KEY, dead.name()).await?;
        tracing::info!(connection = dead.name(), returned, "cleaned stale connection");
        Ok(returned)
    }
}
