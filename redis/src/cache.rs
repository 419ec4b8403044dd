//! Redis-based order cache.
//!
//! - **Key**: `order:{order_id}` → hash of `version` and the bincode-serialized
//!   `order`, expiring after the TTL
//! - **Put**: Lua script comparing versions on the server, so a slower writer
//!   holding an older copy never overwrites a newer one

use crate::connect;
use orderflow_core::providers::OrderCache;
use orderflow_core::{Order, OrderError, OrderId, Result};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

const PUT_SCRIPT: &str = r"
    local cached = redis.call('HGET', KEYS[1], 'version')
    if cached and tonumber(cached) >= tonumber(ARGV[1]) then
        return 0
    end
    redis.call('HSET', KEYS[1], 'version', ARGV[1], 'order', ARGV[2])
    redis.call('EXPIRE', KEYS[1], ARGV[3])
    return 1
";

/// `Redis`-backed order cache.
#[derive(Clone)]
pub struct RedisOrderCache {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
    ttl: Duration,
    put_script: redis::Script,
}

impl RedisOrderCache {
    /// Create a new `Redis` order cache with entries expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Cache`] if connection to `Redis` fails.
    pub async fn new(redis_url: &str, ttl: Duration) -> Result<Self> {
        let conn_manager = connect(redis_url, OrderError::Cache).await?;
        Ok(Self::from_manager(conn_manager, ttl))
    }

    /// Build on an existing connection manager.
    #[must_use]
    pub fn from_manager(conn_manager: ConnectionManager, ttl: Duration) -> Self {
        Self {
            conn_manager,
            ttl,
            put_script: redis::Script::new(PUT_SCRIPT),
        }
    }

    fn order_key(id: &OrderId) -> String {
        format!("order:{id}")
    }
}

impl OrderCache for RedisOrderCache {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        let mut conn = self.conn_manager.clone();

        let bytes: Option<Vec<u8>> = conn
            .hget(Self::order_key(id), "order")
            .await
            .map_err(|e| OrderError::Cache(format!("Failed to get order from Redis: {e}")))?;

        bytes
            .map(|bytes| {
                bincode::deserialize(&bytes)
                    .map_err(|e| OrderError::Cache(format!("Corrupt cached order {id}: {e}")))
            })
            .transpose()
    }

    async fn put(&self, order: &Order) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let bytes = bincode::serialize(order)
            .map_err(|e| OrderError::Cache(format!("Failed to encode order {}: {e}", order.id)))?;

        let written: i64 = self
            .put_script
            .key(Self::order_key(&order.id))
            .arg(order.version)
            .arg(bytes)
            .arg(self.ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| OrderError::Cache(format!("Failed to cache order: {e}")))?;

        if written == 0 {
            tracing::debug!(
                order_id = %order.id,
                version = order.version,
                "Cache already holds a newer copy, skipped"
            );
        } else {
            tracing::debug!(order_id = %order.id, version = order.version, "Cached order");
        }
        Ok(())
    }

    async fn evict(&self, id: &OrderId) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let _: () = conn
            .del(Self::order_key(id))
            .await
            .map_err(|e| OrderError::Cache(format!("Failed to evict order: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_testing::fixtures::ready_order;

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_redis_cache_lifecycle() {
        let cache = RedisOrderCache::new("redis://127.0.0.1:6379", Duration::from_secs(60))
            .await
            .unwrap();
        let order = ready_order("U1");

        assert_eq!(cache.get(&order.id).await.unwrap(), None);

        cache.put(&order).await.unwrap();
        assert_eq!(cache.get(&order.id).await.unwrap(), Some(order.clone()));

        cache.evict(&order.id).await.unwrap();
        assert_eq!(cache.get(&order.id).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_put_keeps_newer_version() {
        let cache = RedisOrderCache::new("redis://127.0.0.1:6379", Duration::from_secs(60))
            .await
            .unwrap();
        let mut older = ready_order("U1");
        older.version = 1;
        let mut newer = older.clone();
        newer.version = 2;

        cache.put(&newer).await.unwrap();
        cache.put(&older).await.unwrap();
        assert_eq!(cache.get(&older.id).await.unwrap(), Some(newer.clone()));

        cache.evict(&older.id).await.unwrap();
    }
}
