//! In-memory order cache.

use orderflow_core::providers::OrderCache;
use orderflow_core::{Order, OrderError, OrderId, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory order cache.
///
/// Writes are version-guarded like the Redis cache.
///
/// # Fault injection
///
/// - [`fail`](Self::fail) makes every call return a cache error
/// - [`fail_puts`](Self::fail_puts) makes only writes fail, so evictions
///   still go through
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderCache {
    entries: Arc<Mutex<HashMap<OrderId, Order>>>,
    failing: Arc<AtomicBool>,
    failing_puts: Arc<AtomicBool>,
}

impl InMemoryOrderCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle failure of every call.
    pub fn fail(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    /// Toggle failure of writes only.
    pub fn fail_puts(&self, fail: bool) {
        self.failing_puts.store(fail, Ordering::SeqCst);
    }

    /// Cached copy of `id`, bypassing failure injection.
    #[must_use]
    pub fn cached(&self, id: &OrderId) -> Option<Order> {
        self.entries.lock().ok().and_then(|e| e.get(id).cloned())
    }

    /// Number of cached orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<OrderId, Order>>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(OrderError::Cache("injected cache failure".into()));
        }
        self.entries
            .lock()
            .map_err(|_| OrderError::Cache("Mutex lock failed".into()))
    }
}

impl OrderCache for InMemoryOrderCache {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        Ok(self.entries()?.get(id).cloned())
    }

    async fn put(&self, order: &Order) -> Result<()> {
        if self.failing_puts.load(Ordering::SeqCst) {
            return Err(OrderError::Cache("injected cache write failure".into()));
        }

        let mut entries = self.entries()?;
        let newer = entries
            .get(&order.id)
            .is_none_or(|cached| cached.version < order.version);
        if newer {
            entries.insert(order.id, order.clone());
        }
        Ok(())
    }

    async fn evict(&self, id: &OrderId) -> Result<()> {
        self.entries()?.remove(id);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use crate::fixtures::ready_order;

    #[tokio::test]
    async fn put_never_replaces_a_newer_version() {
        let cache = InMemoryOrderCache::new();
        let mut older = ready_order("U1");
        older.version = 1;
        let mut newer = older.clone();
        newer.version = 2;

        cache.put(&newer).await.unwrap();
        cache.put(&older).await.unwrap();
        assert_eq!(cache.cached(&older.id).unwrap().version, 2);

        let mut newest = newer.clone();
        newest.version = 3;
        cache.put(&newest).await.unwrap();
        assert_eq!(cache.cached(&older.id).unwrap().version, 3);
    }

    #[tokio::test]
    async fn failing_puts_still_allow_eviction() {
        let cache = InMemoryOrderCache::new();
        let mut order = ready_order("U1");
        order.version = 1;
        cache.put(&order).await.unwrap();

        cache.fail_puts(true);
        assert!(cache.put(&order).await.is_err());
        cache.evict(&order.id).await.unwrap();
        assert!(cache.is_empty());

        cache.fail(true);
        assert!(cache.get(&order.id).await.is_err());
    }
}
