//! Consumer scheduling
//!
//! One poll task per consuming queue moves deliveries from the ready list
//! into the connection's unacked list with single atomic hops, handing each
//! one into a bounded in-memory channel. Worker tasks (one per registered
//! consumer) pull from that channel and run the user callback. The channel
//! is what bounds prefetch: on the store side the unacked list can never
//! grow past the prefetch limit plus one in-flight delivery per worker.

use crate::consumer::{BatchConsumer, Consumer};
use crate::delivery::Delivery;
use crate::store::{check, Store};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Wall-clock bound on how long a batch worker holds a partial batch
pub(crate) const BATCH_TIMEOUT: Duration = Duration::from_secs(1);

/// Receiver end of the delivery buffer, shared by all workers of a queue
pub(crate) type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Delivery>>>;

/// Per-queue consuming state, created by `start_consuming`
pub(crate) struct ConsumeState {
    pub(crate) stopped: Arc<AtomicBool>,
    pub(crate) rx: SharedReceiver,
}

/// Everything the poll task needs; it owns the only sender, so its return
/// closes the delivery channel and lets the workers drain out
pub(crate) struct Poller {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) ready_key: String,
    pub(crate) unacked_key: String,
    pub(crate) rejected_key: String,
    pub(crate) push_key: Arc<std::sync::Mutex<Option<String>>>,
    pub(crate) prefetch_limit: usize,
    pub(crate) poll_interval: Duration,
    pub(crate) stopped: Arc<AtomicBool>,
    pub(crate) tx: mpsc::Sender<Delivery>,
}

impl Poller {
    pub(crate) async fn run(self) {
        loop {
            let batch_size = self.batch_size().await;
            let want_more = self.consume_batch(batch_size).await;

            if !want_more {
                tokio::time::sleep(self.poll_interval).await;
            }

            if self.stopped.load(Ordering::Relaxed) {
                tracing::debug!(ready_key = %self.ready_key, "queue stopped consuming");
                return;
            }
        }
    }

    /// How many deliveries to fetch this round: the free space in the
    /// delivery buffer, capped by the ready-list length. The length read
    /// is advisory (it may be stale); the buffer capacity is the guard
    /// that actually holds.
    async fn batch_size(&self) -> usize {
        let buffered = self.tx.max_capacity() - self.tx.capacity();
        let slack = self.prefetch_limit.saturating_sub(buffered);
        let ready = check("ready length", self.store.llen(&self.ready_key).await) as usize;
        slack.min(ready)
    }

    /// Move up to `batch_size` deliveries from ready to unacked and offer
    /// them to the workers. Returns true only if the full batch was
    /// consumed; an empty pop ends the batch early.
    async fn consume_batch(&self, batch_size: usize) -> bool {
        if batch_size == 0 {
            return false;
        }

        let push_key = self.push_key.lock().unwrap().clone();

        for _ in 0..batch_size {
            let popped = check(
                "consume",
                self.store.rpoplpush(&self.ready_key, &self.unacked_key).await,
            );
            let Some(payload) = popped else {
                return false;
            };

            let delivery = Delivery::new(
                payload,
                self.unacked_key.clone(),
                self.rejected_key.clone(),
                push_key.clone(),
                Arc::clone(&self.store),
            );
            // Blocks while the buffer is full; that backpressure is what
            // keeps prefetch bounded.
            if self.tx.send(delivery).await.is_err() {
                return false;
            }
        }

        true
    }
}

/// Worker loop for a single-delivery consumer: exits once the delivery
/// channel is closed and drained.
pub(crate) async fn consumer_loop(rx: SharedReceiver, consumer: Arc<dyn Consumer>) {
    loop {
        let received = { rx.lock().await.recv().await };
        match received {
            Some(delivery) => consumer.consume(delivery).await,
            None => return,
        }
    }
}

/// Worker loop for a batch consumer: hands the batch over when it reaches
/// `batch_size` or when `BATCH_TIMEOUT` has elapsed, whichever comes
/// first, so low-throughput streams still make progress. The remaining
/// partial batch is delivered when the channel closes.
pub(crate) async fn batch_consumer_loop(
    rx: SharedReceiver,
    batch_size: usize,
    consumer: Arc<dyn BatchConsumer>,
) {
    let mut batch: Vec<Delivery> = Vec::new();
    let mut deadline = tokio::time::Instant::now() + BATCH_TIMEOUT;

    loop {
        let received = tokio::select! {
            received = async { rx.lock().await.recv().await } => received,
            _ = tokio::time::sleep_until(deadline) => {
                if !batch.is_empty() {
                    consumer.consume(std::mem::take(&mut batch)).await;
                }
                deadline = tokio::time::Instant::now() + BATCH_TIMEOUT;
                continue;
            }
        };

        match received {
            Some(delivery) => {
                batch.push(delivery);
                if batch.len() >= batch_size {
                    consumer.consume(std::mem::take(&mut batch)).await;
                    deadline = tokio::time::Instant::now() + BATCH_TIMEOUT;
                }
            }
            None => {
                if !batch.is_empty() {
                    consumer.consume(std::mem::take(&mut batch)).await;
                }
                return;
            }
        }
    }
}
