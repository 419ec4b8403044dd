//! In-memory order store.

use orderflow_core::providers::OrderRepository;
use orderflow_core::{ActorId, Order, OrderError, OrderId, OrderStatistics, OrderStatus, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory order store with the same optimistic versioning as the
/// PostgreSQL backend.
///
/// Clones share storage, so a test can keep a handle for inspection while
/// the coordinator owns another.
///
/// # Fault injection
///
/// - [`fail_saves_for`](Self::fail_saves_for) makes every save of one order fail
/// - [`fail_reads`](Self::fail_reads) makes every read fail
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<Mutex<HashMap<OrderId, Order>>>,
    failing_saves: Arc<Mutex<HashSet<OrderId>>>,
    failing_reads: Arc<Mutex<bool>>,
    saves: Arc<AtomicUsize>,
}

impl InMemoryOrderRepository {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `order` as-is, bypassing version checks.
    ///
    /// Used to seed fixtures in states the public API cannot reach directly
    /// (for example an in-process order with an old `updated_at`). A zero
    /// version is bumped to 1, as if the order had been saved once.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`] if the internal mutex is poisoned.
    pub fn seed(&self, mut order: Order) -> Result<Order> {
        if order.version == 0 {
            order.version = 1;
        }
        self.lock_orders()?.insert(order.id, order.clone());
        Ok(order)
    }

    /// Snapshot of the stored order, if any.
    #[must_use]
    pub fn get(&self, id: &OrderId) -> Option<Order> {
        self.orders.lock().ok().and_then(|orders| orders.get(id).cloned())
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every subsequent save of `id` fail with a storage error.
    pub fn fail_saves_for(&self, id: OrderId) {
        if let Ok(mut failing) = self.failing_saves.lock() {
            failing.insert(id);
        }
    }

    /// Toggle failure of every read.
    pub fn fail_reads(&self, fail: bool) {
        if let Ok(mut failing) = self.failing_reads.lock() {
            *failing = fail;
        }
    }

    fn lock_orders(&self) -> Result<std::sync::MutexGuard<'_, HashMap<OrderId, Order>>> {
        self.orders
            .lock()
            .map_err(|_| OrderError::Storage("Mutex lock failed".into()))
    }

    fn check_reads(&self) -> Result<()> {
        let failing = self
            .failing_reads
            .lock()
            .map_err(|_| OrderError::Storage("Mutex lock failed".into()))?;
        if *failing {
            return Err(OrderError::Storage("injected read failure".into()));
        }
        Ok(())
    }

    fn select(&self, predicate: impl Fn(&Order) -> bool) -> Result<Vec<Order>> {
        self.check_reads()?;
        let orders = self.lock_orders()?;
        let mut selected: Vec<Order> = orders.values().filter(|o| predicate(o)).cloned().collect();
        selected.sort_by_key(|o| (o.created_at, o.id));
        Ok(selected)
    }
}

impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>> {
        self.check_reads()?;
        Ok(self.lock_orders()?.get(id).cloned())
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        self.select(|o| o.status == status)
    }

    async fn find_by_creator(&self, creator: &ActorId) -> Result<Vec<Order>> {
        self.select(|o| &o.created_by == creator)
    }

    async fn find_all(&self) -> Result<Vec<Order>> {
        self.select(|_| true)
    }

    async fn save(&self, order: &Order) -> Result<Order> {
        let failing = self
            .failing_saves
            .lock()
            .map_err(|_| OrderError::Storage("Mutex lock failed".into()))?
            .contains(&order.id);
        if failing {
            return Err(OrderError::Storage(format!(
                "injected save failure for order {}",
                order.id
            )));
        }

        let mut orders = self.lock_orders()?;
        let stored_version = orders.get(&order.id).map_or(0, |stored| stored.version);
        if stored_version != order.version {
            tracing::debug!(
                order_id = %order.id,
                expected = order.version,
                actual = stored_version,
                "Mock rejected stale order write"
            );
            return Err(OrderError::ConcurrentModification { order_id: order.id });
        }

        let mut saved = order.clone();
        saved.version = order.version + 1;
        orders.insert(saved.id, saved.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        drop(orders);

        Ok(saved)
    }

    async fn count(&self) -> Result<u64> {
        self.check_reads()?;
        Ok(self.lock_orders()?.len() as u64)
    }

    async fn count_by_status(&self, status: OrderStatus) -> Result<u64> {
        Ok(self.select(|o| o.status == status)?.len() as u64)
    }

    async fn statistics(&self) -> Result<OrderStatistics> {
        self.check_reads()?;
        let orders = self.lock_orders()?;
        let mut stats = OrderStatistics::default();
        for order in orders.values() {
            stats.total += 1;
            match order.status {
                OrderStatus::Ready => stats.ready += 1,
                OrderStatus::InProcess => stats.in_process += 1,
                OrderStatus::Processed => stats.processed += 1,
            }
        }
        Ok(stats)
    }

    async fn exists_ownership(&self, actor: &ActorId, order_id: &OrderId) -> Result<bool> {
        self.check_reads()?;
        Ok(self
            .lock_orders()?
            .get(order_id)
            .is_some_and(|o| &o.created_by == actor))
    }
}
