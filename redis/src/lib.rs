//! # Orderflow Redis
//!
//! Redis implementations of the shared-state collaborators:
//!
//! - [`RedisProcessingLock`]: per-order processing lock (`SET NX PX` plus an
//!   owner-checked release script)
//! - [`RedisOrderCache`]: bincode-encoded order cache with a TTL
//!
//! Both hold a [`redis::aio::ConnectionManager`], which reconnects on its
//! own and is cheap to clone.
//!
//! ## Example
//!
//! ```no_run
//! use orderflow_redis::{RedisOrderCache, RedisProcessingLock};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), orderflow_core::OrderError> {
//! let lock = RedisProcessingLock::new("redis://127.0.0.1:6379").await?;
//! let cache = RedisOrderCache::new("redis://127.0.0.1:6379", Duration::from_secs(600)).await?;
//! # Ok(())
//! # }
//! ```

mod cache;
mod lock;

pub use cache::RedisOrderCache;
pub use lock::RedisProcessingLock;

use orderflow_core::{OrderError, Result};
use redis::Client;
use redis::aio::ConnectionManager;

/// Open a managed connection to `redis_url`.
///
/// `wrap` turns a driver error message into the caller's error variant.
async fn connect(redis_url: &str, wrap: fn(String) -> OrderError) -> Result<ConnectionManager> {
    let client = Client::open(redis_url)
        .map_err(|e| wrap(format!("Failed to create Redis client: {e}")))?;

    ConnectionManager::new(client)
        .await
        .map_err(|e| wrap(format!("Failed to create Redis connection manager: {e}")))
}
