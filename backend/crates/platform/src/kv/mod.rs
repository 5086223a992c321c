//! Key-Value Store
//!
//! String keys to string values with a per-key TTL. Two backends:
//! - [`RedisKvStore`] for production
//! - [`MemoryKvStore`] for tests and local development
//!
//! Missing or expired keys read as `None`. Transport failures surface as
//! [`KvError::Unavailable`] and are never retried here.

pub mod memory;
pub mod redis;

use std::time::Duration;

use thiserror::Error;

pub use self::memory::MemoryKvStore;
pub use self::redis::RedisKvStore;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("Key-value store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed value under key {key}: {reason}")]
    Decode { key: String, reason: String },
}

pub type KvResult<T> = Result<T, KvError>;

/// One command inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Set {
        key: String,
        value: String,
        ttl: Duration,
    },
    Get {
        key: String,
    },
    Delete {
        key: String,
    },
    /// Delete `key`; if it held `v`, also delete `prefix + v`.
    /// Result is the value `key` held.
    DeleteWithReferent {
        key: String,
        prefix: String,
    },
}

impl BatchOp {
    pub fn set<K: CacheKey>(key: &K, value: &K::Value, ttl: Duration) -> Self {
        BatchOp::Set {
            key: key.key(),
            value: value.encode(),
            ttl,
        }
    }

    pub fn get<K: CacheKey>(key: &K) -> Self {
        BatchOp::Get { key: key.key() }
    }

    pub fn delete<K: CacheKey>(key: &K) -> Self {
        BatchOp::Delete { key: key.key() }
    }

    pub fn delete_with_referent<K: CacheKey>(key: &K, prefix: impl Into<String>) -> Self {
        BatchOp::DeleteWithReferent {
            key: key.key(),
            prefix: prefix.into(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            BatchOp::Set { key, .. }
            | BatchOp::Get { key }
            | BatchOp::Delete { key }
            | BatchOp::DeleteWithReferent { key, .. } => key,
        }
    }
}

/// Key-value store port
#[trait_variant::make(KvStore: Send)]
pub trait LocalKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Overwrites any existing value and resets its TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()>;

    /// Returns how many of `keys` existed.
    async fn delete(&self, keys: &[String]) -> KvResult<u64>;

    /// Run `ops` as one indivisible unit. No other client observes a
    /// partial state. One result per op, in order; `Set` and `Delete`
    /// yield `None`.
    async fn atomic_batch(&self, ops: Vec<BatchOp>) -> KvResult<Vec<Option<String>>>;
}

// ============================================================================
// Typed keys
// ============================================================================

/// Value stored in the key-value store with an explicit wire form.
pub trait CacheValue: Sized {
    fn encode(&self) -> String;

    fn decode(raw: &str) -> Result<Self, String>;
}

impl CacheValue for String {
    fn encode(&self) -> String {
        self.clone()
    }

    fn decode(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}

impl CacheValue for i32 {
    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(raw: &str) -> Result<Self, String> {
        raw.parse().map_err(|e: std::num::ParseIntError| e.to_string())
    }
}

/// A key whose value has a fixed schema.
pub trait CacheKey {
    type Value: CacheValue;

    fn key(&self) -> String;
}

/// Read and decode a typed value.
pub async fn fetch<S, K>(store: &S, key: &K) -> KvResult<Option<K::Value>>
where
    S: KvStore + Sync,
    K: CacheKey + Sync,
{
    let raw_key = key.key();
    match store.get(&raw_key).await? {
        Some(raw) => decode_value::<K::Value>(&raw_key, &raw).map(Some),
        None => Ok(None),
    }
}

/// Encode and write a typed value.
pub async fn put<S, K>(store: &S, key: &K, value: &K::Value, ttl: Duration) -> KvResult<()>
where
    S: KvStore + Sync,
    K: CacheKey + Sync,
    K::Value: Sync,
{
    store.set(&key.key(), &value.encode(), ttl).await
}

/// Decode a raw value read under `key`.
pub fn decode_value<V: CacheValue>(key: &str, raw: &str) -> KvResult<V> {
    V::decode(raw).map_err(|reason| KvError::Decode {
        key: key.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        BatchOp, CacheKey, KvError, KvStore, MemoryKvStore, decode_value, fetch, put,
    };
    use std::time::Duration;

    struct Counter(&'static str);

    impl CacheKey for Counter {
        type Value = i32;

        fn key(&self) -> String {
            format!("counter:{}", self.0)
        }
    }

    #[test]
    fn test_typed_batch_ops() {
        let op = BatchOp::set(&Counter("a"), &7, Duration::from_secs(1));
        assert_eq!(
            op,
            BatchOp::Set {
                key: "counter:a".to_string(),
                value: "7".to_string(),
                ttl: Duration::from_secs(1),
            }
        );
        assert_eq!(
            BatchOp::delete_with_referent(&Counter("b"), "x:").key(),
            "counter:b"
        );
    }

    #[test]
    fn test_decode_error_is_typed() {
        let err = decode_value::<i32>("counter:a", "seven").unwrap_err();
        assert!(matches!(err, KvError::Decode { ref key, .. } if key == "counter:a"));
    }

    #[tokio::test]
    async fn test_fetch_and_put() {
        let store = MemoryKvStore::new();
        assert_eq!(fetch(&store, &Counter("a")).await.unwrap(), None);

        put(&store, &Counter("a"), &42, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(fetch(&store, &Counter("a")).await.unwrap(), Some(42));

        store
            .set("counter:b", "not a number", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(
            fetch(&store, &Counter("b")).await,
            Err(KvError::Decode { .. })
        ));
    }
}
