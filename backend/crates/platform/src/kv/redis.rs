//! Redis-backed key-value store
//!
//! Uses a multiplexed [`ConnectionManager`], which reconnects on its own.
//! Atomic batches run as a single Lua script; Redis executes a script
//! without interleaving other clients' commands.
//!
//! A `DeleteWithReferent` op touches a key computed inside the script, so
//! batches are only atomic on a single Redis node, not across a cluster.

use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::{Client, RedisError, Script};

use super::{BatchOp, KvError, KvResult, KvStore};

/// Each op contributes one key and three args: kind, arg1, arg2.
const BATCH_SCRIPT: &str = r#"
local results = {}
for i, key in ipairs(KEYS) do
  local base = (i - 1) * 3
  local kind = ARGV[base + 1]
  if kind == 'set' then
    redis.call('SET', key, ARGV[base + 2], 'PX', ARGV[base + 3])
    results[i] = false
  elseif kind == 'get' then
    results[i] = redis.call('GET', key)
  elseif kind == 'del' then
    redis.call('DEL', key)
    results[i] = false
  elseif kind == 'delref' then
    local referent = redis.call('GET', key)
    if referent then
      redis.call('DEL', key, ARGV[base + 2] .. referent)
    end
    results[i] = referent
  else
    return redis.error_reply('unknown batch op ' .. tostring(kind))
  end
end
return results
"#;

#[derive(Clone)]
pub struct RedisKvStore {
    conn: ConnectionManager,
    batch_script: Script,
}

impl RedisKvStore {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(url: &str) -> KvResult<Self> {
        let client = Client::open(url).map_err(unavailable)?;
        let conn = ConnectionManager::new(client).await.map_err(unavailable)?;
        let store = Self::from_manager(conn);
        store.ping().await?;
        Ok(store)
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self {
            conn,
            batch_script: Script::new(BATCH_SCRIPT),
        }
    }

    pub async fn ping(&self) -> KvResult<()> {
        let mut conn = self.conn.clone();
        let _: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = ::redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        let mut conn = self.conn.clone();
        let _: () = ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> KvResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = ::redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(removed)
    }

    async fn atomic_batch(&self, ops: Vec<BatchOp>) -> KvResult<Vec<Option<String>>> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }

        let mut invocation = self.batch_script.prepare_invoke();
        for op in &ops {
            invocation.key(op.key());
            for arg in script_args(op) {
                invocation.arg(arg);
            }
        }

        let mut conn = self.conn.clone();
        let results: Vec<Option<String>> = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        tracing::trace!(ops = ops.len(), "Atomic batch executed");
        Ok(results)
    }
}

fn script_args(op: &BatchOp) -> [String; 3] {
    match op {
        BatchOp::Set { value, ttl, .. } => {
            ["set".into(), value.clone(), ttl_millis(*ttl).to_string()]
        }
        BatchOp::Get { .. } => ["get".into(), String::new(), String::new()],
        BatchOp::Delete { .. } => ["del".into(), String::new(), String::new()],
        BatchOp::DeleteWithReferent { prefix, .. } => {
            ["delref".into(), prefix.clone(), String::new()]
        }
    }
}

/// `PX` rejects zero, so sub-millisecond TTLs round up.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn unavailable(err: RedisError) -> KvError {
    KvError::Unavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis() {
        assert_eq!(ttl_millis(Duration::from_secs(900)), 900_000);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
    }

    #[test]
    fn test_script_args() {
        let set = BatchOp::Set {
            key: "access:t".to_string(),
            value: "1".to_string(),
            ttl: Duration::from_secs(900),
        };
        assert_eq!(script_args(&set), ["set", "1", "900000"]);

        let delref = BatchOp::DeleteWithReferent {
            key: "access:user:1".to_string(),
            prefix: "access:".to_string(),
        };
        assert_eq!(script_args(&delref), ["delref", "access:", ""]);
    }

    #[tokio::test]
    async fn test_invalid_url_is_unavailable() {
        let result = RedisKvStore::connect("not a url").await;
        assert!(matches!(result, Err(KvError::Unavailable(_))));
    }
}
