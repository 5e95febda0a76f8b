//! Consumer callback traits

use crate::delivery::Delivery;
use async_trait::async_trait;

/// A callback receiving one delivery at a time
///
/// The implementation is responsible for completing every delivery it
/// receives with `ack`, `reject` or `push`; a delivery it merely drops
/// stays on the unacked list.
#[async_trait]
pub trait Consumer: Send + Sync + 'static {
    async fn consume(&self, delivery: Delivery);
}

/// A callback receiving whole batches of deliveries
///
/// The batch is handed over when it reaches the registered batch size or
/// when one second has passed since the previous hand-over, whichever
/// comes first.
#[async_trait]
pub trait BatchConsumer: Send + Sync + 'static {
    async fn consume(&self, batch: Vec<Delivery>);
}
