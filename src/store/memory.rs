//! In-process store adapter
//!
//! A self-contained implementation of [`Store`] over a mutexed map,
//! mirroring the Redis list and set semantics the queue core relies on
//! (multi-element LPUSH argument order, RPOP from the tail, RPOPLPUSH as a
//! single step, expiring string keys). Backs the test suite and is usable
//! for single-process embedding; it never fails, so fatal-error paths are
//! unreachable with it.

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

enum Entry {
    List(VecDeque<Vec<u8>>),
    Set(HashSet<String>),
    Value { expires_at: Instant },
}

/// In-memory store with Redis-compatible list and set semantics
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    append_calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `lpush` calls served so far.
    ///
    /// One buffered flush of many payloads counts as a single call, which
    /// is what makes publish coalescing observable.
    pub fn append_count(&self) -> u64 {
        self.append_calls.load(Ordering::Relaxed)
    }

    fn wrong_type(key: &str) -> StoreError {
        StoreError::OperationFailed(format!(
            "WRONGTYPE operation against key '{key}' holding the wrong kind of value"
        ))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn lpush(&self, key: &str, payloads: &[Vec<u8>]) -> StoreResult<()> {
        if payloads.is_empty() {
            return Ok(());
        }
        self.append_calls.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()));
        match entry {
            Entry::List(list) => {
                for payload in payloads {
                    list.push_front(payload.clone());
                }
                Ok(())
            }
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn rpop(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(Entry::List(list)) => {
                let popped = list.pop_back();
                if list.is_empty() {
                    entries.remove(key);
                }
                Ok(popped)
            }
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn rpoplpush(&self, src: &str, dst: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().unwrap();

        let payload = match entries.get_mut(src) {
            Some(Entry::List(list)) => {
                let popped = list.pop_back();
                if list.is_empty() {
                    entries.remove(src);
                }
                match popped {
                    Some(payload) => payload,
                    None => return Ok(None),
                }
            }
            Some(_) => return Err(Self::wrong_type(src)),
            None => return Ok(None),
        };

        let entry = entries
            .entry(dst.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()));
        match entry {
            Entry::List(list) => {
                list.push_front(payload.clone());
                Ok(Some(payload))
            }
            _ => Err(Self::wrong_type(dst)),
        }
    }

    async fn llen(&self, key: &str) -> StoreResult<u64> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(Entry::List(list)) => Ok(list.len() as u64),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn del(&self, key: &str) -> StoreResult<u64> {
        let mut entries = self.entries.lock().unwrap();
        Ok(entries.remove(key).map(|_| 1).unwrap_or(0))
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<u64> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(HashSet::new()));
        match entry {
            Entry::Set(set) => Ok(set.insert(member.to_string()) as u64),
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> StoreResult<u64> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(Entry::Set(set)) => {
                let removed = set.remove(member) as u64;
                if set.is_empty() {
                    entries.remove(key);
                }
                Ok(removed)
            }
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(Entry::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn set_ex(&self, key: &str, _value: &str, ttl: Duration) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry::Value {
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(Entry::Value { expires_at }) => {
                if *expires_at <= Instant::now() {
                    entries.remove(key);
                    Ok(false)
                } else {
                    Ok(true)
                }
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lpush_rpop_is_fifo() {
        let store = MemoryStore::new();
        store.lpush("list", &[b"a".to_vec()]).await.unwrap();
        store.lpush("list", &[b"b".to_vec()]).await.unwrap();
        store.lpush("list", &[b"c".to_vec()]).await.unwrap();

        assert_eq!(store.llen("list").await.unwrap(), 3);
        assert_eq!(store.rpop("list").await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.rpop("list").await.unwrap(), Some(b"b".to_vec()));
        assert_eq!(store.rpop("list").await.unwrap(), Some(b"c".to_vec()));
        assert_eq!(store.rpop("list").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_multi_element_lpush_preserves_order() {
        let store = MemoryStore::new();
        store
            .lpush("list", &[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()])
            .await
            .unwrap();

        // One call, three elements, popped in argument order.
        assert_eq!(store.append_count(), 1);
        assert_eq!(store.rpop("list").await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.rpop("list").await.unwrap(), Some(b"b".to_vec()));
        assert_eq!(store.rpop("list").await.unwrap(), Some(b"c".to_vec()));
    }

    #[tokio::test]
    async fn test_rpoplpush_moves_tail_to_head() {
        let store = MemoryStore::new();
        store
            .lpush("src", &[b"first".to_vec(), b"second".to_vec()])
            .await
            .unwrap();

        let moved = store.rpoplpush("src", "dst").await.unwrap();
        assert_eq!(moved, Some(b"first".to_vec()));
        assert_eq!(store.llen("src").await.unwrap(), 1);
        assert_eq!(store.llen("dst").await.unwrap(), 1);

        // The moved element sits at the head of dst, so it pops last.
        store.rpoplpush("src", "dst").await.unwrap();
        assert_eq!(store.rpop("dst").await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(store.rpop("dst").await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_rpoplpush_empty_source() {
        let store = MemoryStore::new();
        assert_eq!(store.rpoplpush("missing", "dst").await.unwrap(), None);
        assert_eq!(store.llen("dst").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sets() {
        let store = MemoryStore::new();
        assert_eq!(store.sadd("set", "a").await.unwrap(), 1);
        assert_eq!(store.sadd("set", "a").await.unwrap(), 0);
        store.sadd("set", "b").await.unwrap();

        let mut members = store.smembers("set").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);

        assert_eq!(store.srem("set", "a").await.unwrap(), 1);
        assert_eq!(store.srem("set", "missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_value_expiry() {
        let store = MemoryStore::new();
        store
            .set_ex("hb", "1", Duration::from_millis(20))
            .await
            .unwrap();
        assert!(store.exists("hb").await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!store.exists("hb").await.unwrap());
    }

    #[tokio::test]
    async fn test_del() {
        let store = MemoryStore::new();
        store.lpush("list", &[b"x".to_vec()]).await.unwrap();
        assert_eq!(store.del("list").await.unwrap(), 1);
        assert_eq!(store.del("list").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let store = MemoryStore::new();
        store.sadd("set", "a").await.unwrap();
        assert!(store.lpush("set", &[b"x".to_vec()]).await.is_err());
        assert!(store.llen("set").await.unwrap_err().to_string().contains("WRONGTYPE"));
    }
}
