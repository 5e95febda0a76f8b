//! rmq - Redis-backed message queue
//!
//! A work-queue library layered over a shared key-value store with list
//! and set primitives. Producers publish opaque byte payloads into named
//! queues; consumer processes pull them, process them and acknowledge,
//! reject or forward each delivery. The store is the source of truth, so
//! any number of processes can produce and consume the same queues.
//!
//! # Guarantees
//!
//! - **At-least-once delivery**: a published payload that has not been
//!   acknowledged is always in exactly one of the ready, unacked or
//!   rejected lists (or a push target's ready list), every transition
//!   between them being a single atomic store operation.
//! - **Crash recovery**: deliveries held by a process that dies stay on
//!   that connection's unacked list until a [`Cleaner`] returns them to
//!   ready, once the connection's heartbeat has expired.
//! - **Bounded prefetch**: consumers pull through a bounded in-memory
//!   buffer, so the store-side unacked depth never exceeds the prefetch
//!   limit plus one delivery per worker.
//!
//! Not guaranteed: ordering across publishers, exactly-once delivery, and
//! fairness between competing consumer processes.
//!
//! # Architecture
//!
//! ```text
//!  publisher                               consumer process
//!     │ publish (direct or buffered)          │ callbacks
//!     ▼                                       ▼
//!  ┌─────────┐  rpoplpush   ┌──────────┐   ┌─────────┐
//!  │  ready  │ ───────────► │ unacked  │──►│ workers │
//!  └─────────┘   (atomic)   └──────────┘   └─────────┘
//!     ▲                        │ ack: remove
//!     │ return                 │ reject ──► rejected list
//!     └── cleaner / operator   │ push ────► other queue's ready
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use rmq::{Connection, ConnectionConfig, Consumer, Delivery};
//!
//! struct Printer;
//!
//! #[async_trait::async_trait]
//! impl Consumer for Printer {
//!     async fn consume(&self, delivery: Delivery) {
//!         println!("got {}", delivery.payload_str());
//!         delivery.ack().await;
//!     }
//! }
//!
//! # async fn run() -> rmq::StoreResult<()> {
//! let connection = Connection::open("worker", ConnectionConfig::default()).await?;
//! let queue = connection.open_queue("things").await;
//! queue.publish("hello").await;
//! queue.start_consuming(10, std::time::Duration::from_millis(100)).await;
//! queue.add_consumer("printer", Printer).await;
//! # Ok(())
//! # }
//! ```

pub mod cleaner;
pub mod config;
pub mod connection;
pub mod consumer;
pub mod delivery;
pub mod error;
pub mod keys;
pub mod queue;
pub mod stats;
pub mod store;

pub use cleaner::Cleaner;
pub use config::ConnectionConfig;
pub use connection::Connection;
pub use consumer::{BatchConsumer, Consumer};
pub use delivery::Delivery;
pub use error::{StoreError, StoreResult};
pub use queue::Queue;
pub use stats::{collect_stats, ConnectionStat, QueueStat, Stats};
pub use store::{MemoryStore, RedisStore, Store};
