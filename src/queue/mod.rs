//! Queue façade
//!
//! A [`Queue`] is identified by its name and the connection it was opened
//! on. Producers publish opaque byte payloads into its ready list (directly
//! or through the optional publish buffer); consumers pull them through the
//! poll task and worker routines of the consume module. All state lives in
//! the backing store; the queue value itself only carries the derived keys,
//! the store handle and the local consuming machinery.

mod consume;
mod publish;

use crate::connection::generate_name;
use crate::consumer::{BatchConsumer, Consumer};
use crate::keys;
use crate::store::{check, Store};

use consume::{ConsumeState, Poller};
use publish::PublishBuffer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A named queue bound to one connection
pub struct Queue {
    name: String,
    connection_name: String,
    queues_key: String,    // set of queues consumed on this connection
    consumers_key: String, // set of consumers using this connection
    ready_key: String,     // list of ready deliveries
    rejected_key: String,  // list of rejected deliveries
    unacked_key: String,   // list of currently consuming deliveries
    push_key: Arc<std::sync::Mutex<Option<String>>>,
    store: Arc<dyn Store>,

    consume: tokio::sync::Mutex<Option<ConsumeState>>,
    publish_buffer: tokio::sync::RwLock<Option<PublishBuffer>>,
}

impl Queue {
    pub(crate) fn new(name: &str, connection_name: &str, store: Arc<dyn Store>) -> Self {
        Self {
            name: name.to_string(),
            connection_name: connection_name.to_string(),
            queues_key: keys::connection_queues_key(connection_name),
            consumers_key: keys::connection_queue_consumers_key(connection_name, name),
            ready_key: keys::queue_ready_key(name),
            rejected_key: keys::queue_rejected_key(name),
            unacked_key: keys::connection_queue_unacked_key(connection_name, name),
            push_key: Arc::new(std::sync::Mutex::new(None)),
            store,
            consume: tokio::sync::Mutex::new(None),
            publish_buffer: tokio::sync::RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    /// Publish a payload to this queue. Buffered publishes always report
    /// success; a direct publish reports whether the append succeeded.
    pub async fn publish(&self, payload: &str) -> bool {
        self.publish_bytes(payload.as_bytes()).await
    }

    /// Publish raw bytes, byte-identical to [`publish`](Queue::publish).
    pub async fn publish_bytes(&self, payload: &[u8]) -> bool {
        let buffer = self.publish_buffer.read().await;
        if let Some(buffer) = buffer.as_ref() {
            buffer.enqueue(payload.to_vec()).await;
            return true;
        }

        check(
            "publish",
            self.store.lpush(&self.ready_key, &[payload.to_vec()]).await,
        );
        true
    }

    /// Enable, resize or disable publish buffering.
    ///
    /// Size 0 disables buffering; any other size installs a buffer of that
    /// capacity drained every `poll_interval`. Passing the current size is
    /// a no-op. Any previous buffer is fully drained before this returns;
    /// concurrent `publish` calls observe either the old buffer or the new
    /// state, never a half-swapped one.
    pub async fn set_publish_buffer_size(&self, size: usize, poll_interval: Duration) {
        let mut buffer = self.publish_buffer.write().await;

        let current = buffer.as_ref().map(PublishBuffer::capacity).unwrap_or(0);
        if current == size {
            return;
        }

        if let Some(previous) = buffer.take() {
            previous.shutdown().await;
        }

        if size > 0 {
            *buffer = Some(PublishBuffer::start(
                size,
                poll_interval,
                self.ready_key.clone(),
                Arc::clone(&self.store),
            ));
        }
    }

    /// Record `push_queue`'s ready list as this queue's push target.
    ///
    /// Deliveries of this queue answered with `push` are then forwarded
    /// there. Only meaningful for queues sharing the same store.
    pub fn set_push_queue(&self, push_queue: &Queue) {
        *self.push_key.lock().unwrap() = Some(push_queue.ready_key.clone());
    }

    /// Start consuming into an in-memory buffer of size `prefetch_limit`.
    ///
    /// Must be called before consumers can be added. `poll_interval` is
    /// how long the poll task sleeps when no deliveries are ready. Returns
    /// false if this queue is already consuming.
    pub async fn start_consuming(&self, prefetch_limit: usize, poll_interval: Duration) -> bool {
        let mut consume = self.consume.lock().await;
        if consume.is_some() {
            return false;
        }

        // register this queue on its connection
        check(
            "start consuming",
            self.store.sadd(&self.queues_key, &self.name).await,
        );

        let stopped = Arc::new(AtomicBool::new(false));
        // A zero-capacity channel does not exist; with prefetch 0 the
        // batch size computation never admits a delivery, so the slack
        // slot stays unused.
        let (tx, rx) = mpsc::channel(prefetch_limit.max(1));

        let poller = Poller {
            store: Arc::clone(&self.store),
            ready_key: self.ready_key.clone(),
            unacked_key: self.unacked_key.clone(),
            rejected_key: self.rejected_key.clone(),
            push_key: Arc::clone(&self.push_key),
            prefetch_limit,
            poll_interval,
            stopped: Arc::clone(&stopped),
            tx,
        };
        tokio::spawn(poller.run());

        *consume = Some(ConsumeState {
            stopped,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        });
        tracing::debug!(queue = %self, prefetch_limit, "started consuming");
        true
    }

    /// Signal the poll task to stop.
    ///
    /// Cooperative: the poll task returns on its next iteration, after
    /// which the workers drain whatever is already buffered and exit. In-
    /// flight callbacks are not cancelled. Returns false if the queue is
    /// not consuming or was already stopped.
    pub async fn stop_consuming(&self) -> bool {
        let consume = self.consume.lock().await;
        match consume.as_ref() {
            Some(state) => !state.stopped.swap(true, Ordering::Relaxed),
            None => false,
        }
    }

    /// Register a consumer and spawn its worker task; returns the internal
    /// consumer name.
    ///
    /// Panics if called before [`start_consuming`](Queue::start_consuming).
    pub async fn add_consumer<C: Consumer>(&self, tag: &str, consumer: C) -> String {
        let (name, rx) = self.register_consumer(tag).await;
        tokio::spawn(consume::consumer_loop(rx, Arc::new(consumer)));
        name
    }

    /// Like [`add_consumer`](Queue::add_consumer), but the callback
    /// receives batches of up to `batch_size` deliveries. A partial batch
    /// is handed over once a second.
    pub async fn add_batch_consumer<C: BatchConsumer>(
        &self,
        tag: &str,
        batch_size: usize,
        consumer: C,
    ) -> String {
        let (name, rx) = self.register_consumer(tag).await;
        tokio::spawn(consume::batch_consumer_loop(rx, batch_size, Arc::new(consumer)));
        name
    }

    async fn register_consumer(&self, tag: &str) -> (String, consume::SharedReceiver) {
        let consume = self.consume.lock().await;
        let state = match consume.as_ref() {
            Some(state) => state,
            None => panic!("queue {}: add_consumer requires start_consuming first", self),
        };

        let name = generate_name(tag);
        check(
            "add consumer",
            self.store.sadd(&self.consumers_key, &name).await,
        );
        tracing::debug!(queue = %self, consumer = %name, "added consumer");
        (name, Arc::clone(&state.rx))
    }

    /// Names of the consumers registered on this connection and queue.
    pub async fn consumers(&self) -> Vec<String> {
        check("consumers", self.store.smembers(&self.consumers_key).await)
    }

    /// Remove one consumer by its internal name.
    pub async fn remove_consumer(&self, name: &str) -> bool {
        check(
            "remove consumer",
            self.store.srem(&self.consumers_key, name).await,
        ) > 0
    }

    /// Remove all consumers of this connection and queue, returning how
    /// many were removed.
    pub async fn remove_all_consumers(&self) -> u64 {
        check(
            "remove all consumers",
            self.store.del(&self.consumers_key).await,
        )
    }

    pub async fn ready_count(&self) -> u64 {
        check("ready count", self.store.llen(&self.ready_key).await)
    }

    pub async fn unacked_count(&self) -> u64 {
        check("unacked count", self.store.llen(&self.unacked_key).await)
    }

    pub async fn rejected_count(&self) -> u64 {
        check("rejected count", self.store.llen(&self.rejected_key).await)
    }

    /// Remove all ready deliveries; returns whether any were removed.
    pub async fn purge_ready(&self) -> bool {
        check("purge ready", self.store.del(&self.ready_key).await) > 0
    }

    /// Remove all rejected deliveries; returns whether any were removed.
    pub async fn purge_rejected(&self) -> bool {
        check("purge rejected", self.store.del(&self.rejected_key).await) > 0
    }

    /// Move all unacked deliveries of this connection back to the ready
    /// list, returning the number moved. Used after a consumer process is
    /// known to be gone.
    pub async fn return_all_unacked(&self) -> u64 {
        let count = check(
            "unacked length",
            self.store.llen(&self.unacked_key).await,
        );
        for moved in 0..count {
            let popped = check(
                "return unacked",
                self.store.rpoplpush(&self.unacked_key, &self.ready_key).await,
            );
            if popped.is_none() {
                return moved;
            }
        }
        count
    }

    /// Move up to `count` rejected deliveries back to the ready list,
    /// returning the number moved.
    pub async fn return_rejected(&self, count: u64) -> u64 {
        for moved in 0..count {
            let popped = check(
                "return rejected",
                self.store.rpoplpush(&self.rejected_key, &self.ready_key).await,
            );
            if popped.is_none() {
                return moved;
            }
        }
        count
    }

    /// Move all rejected deliveries back to the ready list, returning the
    /// number moved.
    pub async fn return_all_rejected(&self) -> u64 {
        let count = check(
            "rejected length",
            self.store.llen(&self.rejected_key).await,
        );
        self.return_rejected(count).await
    }

    /// Purge the queue and remove it from the set of open queues. The
    /// local consumer scheduler is not stopped; closing a queue that is
    /// still consuming is a caller error.
    pub async fn close(&self) -> bool {
        self.purge_rejected().await;
        self.purge_ready().await;
        check(
            "close queue",
            self.store.srem(keys::QUEUES_KEY, &self.name).await,
        ) > 0
    }

    /// Remove every key this queue holds on its connection. Used by the
    /// cleaner once the connection is known to be dead.
    pub(crate) async fn close_in_connection(&self) {
        check("close in connection", self.store.del(&self.unacked_key).await);
        check(
            "close in connection",
            self.store.del(&self.consumers_key).await,
        );
        check(
            "close in connection",
            self.store.srem(&self.queues_key, &self.name).await,
        );
    }
}

impl std::fmt::Display for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} conn:{}]", self.name, self.connection_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn queue() -> Queue {
        Queue::new("things", "conn1", Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_display() {
        assert_eq!(queue().to_string(), "[things conn:conn1]");
    }

    #[test]
    fn test_derived_keys() {
        let queue = queue();
        assert_eq!(queue.ready_key, "rmq::queue::[things]::ready");
        assert_eq!(queue.rejected_key, "rmq::queue::[things]::rejected");
        assert_eq!(
            queue.unacked_key,
            "rmq::connection::conn1::queue::[things]::unacked"
        );
        assert_eq!(
            queue.consumers_key,
            "rmq::connection::conn1::queue::[things]::consumers"
        );
        assert_eq!(queue.queues_key, "rmq::connection::conn1::queues");
    }

    #[tokio::test]
    async fn test_set_push_queue_records_ready_key() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let queue = Queue::new("main", "conn1", store.clone());
        let target = Queue::new("push", "conn1", store);

        queue.set_push_queue(&target);
        assert_eq!(
            queue.push_key.lock().unwrap().as_deref(),
            Some("rmq::queue::[push]::ready")
        );
    }
}
