//! A single in-flight delivery
//!
//! A delivery is created when a payload is moved from a queue's ready list
//! into the connection's unacked list, and completed by exactly one of
//! [`ack`](Delivery::ack), [`reject`](Delivery::reject) or
//! [`push`](Delivery::push). Each completion is a single atomic store call.
//! A delivery that is dropped without being completed simply stays on the
//! unacked list, where the cleaner can recover it if the owning connection
//! dies.

use crate::store::{check, Store};
use std::sync::Arc;

/// One payload held by a consumer, together with the keys needed to
/// complete it
pub struct Delivery {
    payload: Vec<u8>,
    unacked_key: String,
    rejected_key: String,
    push_key: Option<String>,
    store: Arc<dyn Store>,
}

impl Delivery {
    pub(crate) fn new(
        payload: Vec<u8>,
        unacked_key: String,
        rejected_key: String,
        push_key: Option<String>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            payload,
            unacked_key,
            rejected_key,
            push_key,
            store,
        }
    }

    /// The payload as raw bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The payload interpreted as UTF-8, with invalid sequences replaced.
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Acknowledge the delivery, removing one element from the unacked
    /// list. Returns whether an element was removed.
    pub async fn ack(self) -> bool {
        let removed = check("ack", self.store.rpop(&self.unacked_key).await);
        removed.is_some()
    }

    /// Reject the delivery, atomically moving one element from the unacked
    /// list to the rejected list. Returns whether an element was moved.
    pub async fn reject(self) -> bool {
        let moved = check(
            "reject",
            self.store
                .rpoplpush(&self.unacked_key, &self.rejected_key)
                .await,
        );
        moved.is_some()
    }

    /// Forward the delivery to the queue's push target, atomically moving
    /// one element from the unacked list to the target's ready list. If no
    /// push target is configured this behaves like
    /// [`reject`](Delivery::reject).
    pub async fn push(self) -> bool {
        let destination = self.push_key.clone();
        match destination {
            Some(destination) => {
                let moved = check(
                    "push",
                    self.store.rpoplpush(&self.unacked_key, &destination).await,
                );
                moved.is_some()
            }
            None => self.reject().await,
        }
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("payload", &self.payload_str())
            .field("unacked_key", &self.unacked_key)
            .finish()
    }
}
