//! Read-through cache for single-order lookups.

use crate::error::Result;
use crate::types::{Order, OrderId};

/// Order cache populated explicitly after successful writes.
///
/// Cache failures must never fail the operation that triggered them;
/// callers log, evict, and carry on.
///
/// # Ordering
///
/// Writes race: a read-through of version `n` can land after a transition
/// cached `n + 1`. `put` therefore only replaces an entry holding a lower
/// [`Order::version`], so a cached copy never moves backwards.
pub trait OrderCache: Send + Sync {
    /// Cached copy of the order, if any.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Cache`](crate::OrderError::Cache) if the cache backend fails.
    fn get(&self, id: &OrderId) -> impl std::future::Future<Output = Result<Option<Order>>> + Send;

    /// Stores `order` unless the cache already holds the same or a newer
    /// version of it.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Cache`](crate::OrderError::Cache) if the cache backend fails.
    fn put(&self, order: &Order) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Drops the cached copy.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Cache`](crate::OrderError::Cache) if the cache backend fails.
    fn evict(&self, id: &OrderId) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// A disabled cache: every lookup misses and writes are dropped.
impl<C: OrderCache> OrderCache for Option<C> {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        match self {
            Some(cache) => cache.get(id).await,
            None => Ok(None),
        }
    }

    async fn put(&self, order: &Order) -> Result<()> {
        match self {
            Some(cache) => cache.put(order).await,
            None => Ok(()),
        }
    }

    async fn evict(&self, id: &OrderId) -> Result<()> {
        match self {
            Some(cache) => cache.evict(id).await,
            None => Ok(()),
        }
    }
}
