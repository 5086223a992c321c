//! In-process key-value store
//!
//! One map behind one lock. Expiry is passive: an entry past its deadline is
//! treated as absent and dropped on the next touch. Deadlines use
//! `tokio::time::Instant`, so paused-clock tests can advance past a TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{BatchOp, KvResult, KvStore};

struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
struct Entries(HashMap<String, Entry>);

impl Entries {
    fn get(&mut self, key: &str, now: Instant) -> Option<String> {
        match self.0.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                self.0.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&mut self, key: &str, value: &str, ttl: Duration, now: Instant) {
        self.0.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
    }

    /// Remove `key`, returning its value if it was live.
    fn take(&mut self, key: &str, now: Instant) -> Option<String> {
        self.0
            .remove(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value)
    }
}

/// Key-value store backed by a process-local map.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<Mutex<Entries>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.0.values().filter(|e| e.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let now = Instant::now();
        Ok(self.entries.lock().await.get(key, now))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        let now = Instant::now();
        self.entries.lock().await.set(key, value, ttl, now);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> KvResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let removed = keys
            .iter()
            .filter(|key| entries.take(key, now).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn atomic_batch(&self, ops: Vec<BatchOp>) -> KvResult<Vec<Option<String>>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let results = ops
            .into_iter()
            .map(|op| match op {
                BatchOp::Set { key, value, ttl } => {
                    entries.set(&key, &value, ttl, now);
                    None
                }
                BatchOp::Get { key } => entries.get(&key, now),
                BatchOp::Delete { key } => {
                    entries.take(&key, now);
                    None
                }
                BatchOp::DeleteWithReferent { key, prefix } => {
                    let referent = entries.take(&key, now)?;
                    entries.take(&format!("{prefix}{referent}"), now);
                    Some(referent)
                }
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op_set(key: &str, value: &str, secs: u64) -> BatchOp {
        BatchOp::Set {
            key: key.to_string(),
            value: value.to_string(),
            ttl: Duration::from_secs(secs),
        }
    }

    #[tokio::test]
    async fn test_get_set_delete() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        store.set("k", "w", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("w".to_string()));

        let removed = store
            .delete(&["k".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = MemoryKvStore::new();
        store.set("short", "1", Duration::from_secs(5)).await.unwrap();
        store.set("long", "2", Duration::from_secs(50)).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.get("long").await.unwrap(), Some("2".to_string()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_batch_results_follow_op_order() {
        let store = MemoryKvStore::new();
        let results = store
            .atomic_batch(vec![
                op_set("a", "1", 10),
                BatchOp::Get {
                    key: "a".to_string(),
                },
                BatchOp::Get {
                    key: "b".to_string(),
                },
                BatchOp::Delete {
                    key: "a".to_string(),
                },
                BatchOp::Get {
                    key: "a".to_string(),
                },
            ])
            .await
            .unwrap();

        assert_eq!(results, vec![None, Some("1".to_string()), None, None, None]);
    }

    #[tokio::test]
    async fn test_delete_with_referent() {
        let store = MemoryKvStore::new();
        store
            .atomic_batch(vec![
                op_set("user:1", "tok", 10),
                op_set("fwd:tok", "1", 10),
                op_set("fwd:other", "2", 10),
            ])
            .await
            .unwrap();

        let results = store
            .atomic_batch(vec![
                BatchOp::DeleteWithReferent {
                    key: "user:1".to_string(),
                    prefix: "fwd:".to_string(),
                },
                BatchOp::DeleteWithReferent {
                    key: "user:2".to_string(),
                    prefix: "fwd:".to_string(),
                },
            ])
            .await
            .unwrap();

        assert_eq!(results, vec![Some("tok".to_string()), None]);
        assert_eq!(store.get("fwd:tok").await.unwrap(), None);
        assert_eq!(store.get("fwd:other").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_referent_is_not_followed() {
        let store = MemoryKvStore::new();
        store.set("user:1", "tok", Duration::from_secs(1)).await.unwrap();
        store.set("fwd:tok", "1", Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        let results = store
            .atomic_batch(vec![BatchOp::DeleteWithReferent {
                key: "user:1".to_string(),
                prefix: "fwd:".to_string(),
            }])
            .await
            .unwrap();
        assert_eq!(results, vec![None]);
        assert_eq!(store.get("fwd:tok").await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let a = MemoryKvStore::new();
        let b = a.clone();
        a.set("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(b.get("k").await.unwrap(), Some("v".to_string()));
    }
}
