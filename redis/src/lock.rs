//! Redis-based processing lock.
//!
//! # Storage Strategy
//!
//! - **Key**: `orderLock:{order_id}` → holder token, expiring after the TTL
//! - **Acquire**: `SET key holder NX PX ttl`, atomic on the server
//! - **Release**: Lua script deleting the key only if it still holds the
//!   caller's token, so an expired-then-retaken lock is never freed by its
//!   previous holder

use crate::connect;
use orderflow_core::providers::ProcessingLock;
use orderflow_core::{OrderError, Result};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

const RELEASE_SCRIPT: &str = r"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
";

/// `Redis`-backed processing lock, shared by every coordinator instance.
#[derive(Clone)]
pub struct RedisProcessingLock {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
    release_script: redis::Script,
}

impl RedisProcessingLock {
    /// Create a new `Redis` processing lock.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::LockService`] if connection to `Redis` fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let conn_manager = connect(redis_url, OrderError::LockService).await?;
        Ok(Self::from_manager(conn_manager))
    }

    /// Build on an existing connection manager.
    #[must_use]
    pub fn from_manager(conn_manager: ConnectionManager) -> Self {
        Self {
            conn_manager,
            release_script: redis::Script::new(RELEASE_SCRIPT),
        }
    }
}

impl ProcessingLock for RedisProcessingLock {
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        #[allow(clippy::cast_possible_truncation)] // Safe: lock leases are seconds to minutes
        let ttl_ms = ttl.as_millis().max(1) as u64;

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(holder)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| OrderError::LockService(format!("Failed to acquire lock {key}: {e}")))?;

        let acquired = reply.is_some();
        tracing::debug!(key, holder, ttl_ms, acquired, "Lock acquire attempted");
        Ok(acquired)
    }

    async fn release(&self, key: &str, holder: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let deleted: i64 = self
            .release_script
            .key(key)
            .arg(holder)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| OrderError::LockService(format!("Failed to release lock {key}: {e}")))?;

        if deleted == 0 {
            tracing::debug!(key, holder, "Lock already expired or taken over, nothing released");
        }
        Ok(())
    }

    async fn is_held(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();

        let exists: bool = conn
            .exists(key)
            .await
            .map_err(|e| OrderError::LockService(format!("Failed to probe lock {key}: {e}")))?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_core::OrderId;
    use orderflow_core::providers::processing_lock_key;

    // Note: These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_acquire_is_exclusive() {
        let lock = RedisProcessingLock::new("redis://127.0.0.1:6379").await.unwrap();
        let key = processing_lock_key(&OrderId::new());

        assert!(lock.try_acquire(&key, "a", TTL).await.unwrap());
        assert!(!lock.try_acquire(&key, "b", TTL).await.unwrap());
        assert!(lock.is_held(&key).await.unwrap());

        lock.release(&key, "a").await.unwrap();
        assert!(!lock.is_held(&key).await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_release_checks_holder() {
        let lock = RedisProcessingLock::new("redis://127.0.0.1:6379").await.unwrap();
        let key = processing_lock_key(&OrderId::new());

        lock.try_acquire(&key, "a", TTL).await.unwrap();
        lock.release(&key, "b").await.unwrap();
        assert!(lock.is_held(&key).await.unwrap());

        lock.release(&key, "a").await.unwrap();
        assert!(!lock.is_held(&key).await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_lease_expires() {
        let lock = RedisProcessingLock::new("redis://127.0.0.1:6379").await.unwrap();
        let key = processing_lock_key(&OrderId::new());

        lock.try_acquire(&key, "a", Duration::from_millis(50)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!lock.is_held(&key).await.unwrap());
        assert!(lock.try_acquire(&key, "b", TTL).await.unwrap());
        lock.release(&key, "b").await.unwrap();
    }
}
