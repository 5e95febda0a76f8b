//! Publish buffering
//!
//! An optional in-process buffer that coalesces many publishes into
//! multi-element appends, trading durability for fewer store round-trips:
//! a payload accepted into the buffer is only on the wire once the drain
//! task flushes it, and a failed flush drops the batch after logging it.

use crate::store::Store;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

/// A running publish buffer: the channel feeding the drain task plus the
/// handle needed to wait for its final flush
pub(crate) struct PublishBuffer {
    tx: mpsc::Sender<Vec<u8>>,
    capacity: usize,
    drain: JoinHandle<()>,
}

impl PublishBuffer {
    /// Install a buffer of the given capacity and spawn its drain task.
    pub(crate) fn start(
        capacity: usize,
        poll_interval: Duration,
        ready_key: String,
        store: Arc<dyn Store>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let drain = tokio::spawn(drain_loop(rx, ready_key, store, poll_interval));
        Self {
            tx,
            capacity,
            drain,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue a payload, blocking while the buffer is full.
    pub(crate) async fn enqueue(&self, payload: Vec<u8>) {
        // The sender is only dropped while the exclusive buffer lock is
        // held, so a send from under the shared lock cannot fail.
        if self.tx.send(payload).await.is_err() {
            tracing::error!("publish buffer drain task gone, dropping payload");
        }
    }

    /// Close the buffer and wait until the drain task has flushed the
    /// remaining payloads and exited.
    pub(crate) async fn shutdown(self) {
        drop(self.tx);
        if let Err(err) = self.drain.await {
            tracing::error!(%err, "publish buffer drain task failed");
        }
    }
}

/// Drain the buffered payloads into the ready list.
///
/// Payloads are pulled without blocking for as long as any are pending and
/// flushed as one multi-element append once the input runs dry; an idle
/// buffer sleeps for `poll_interval` between checks. When the channel
/// closes, the remaining batch is flushed and the task exits.
async fn drain_loop(
    mut rx: mpsc::Receiver<Vec<u8>>,
    ready_key: String,
    store: Arc<dyn Store>,
    poll_interval: Duration,
) {
    let mut batch: Vec<Vec<u8>> = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(payload) => batch.push(payload),
            Err(TryRecvError::Empty) => {
                if batch.is_empty() {
                    tokio::time::sleep(poll_interval).await;
                } else {
                    flush(store.as_ref(), &ready_key, &mut batch).await;
                }
            }
            Err(TryRecvError::Disconnected) => {
                flush(store.as_ref(), &ready_key, &mut batch).await;
                return;
            }
        }
    }
}

async fn flush(store: &dyn Store, ready_key: &str, batch: &mut Vec<Vec<u8>>) {
    if batch.is_empty() {
        return;
    }
    if let Err(err) = store.lpush(ready_key, batch).await {
        tracing::warn!(%err, count = batch.len(), "failed to publish batch, dropping it");
    }
    batch.clear();
}
