//! Durable order store.

use crate::error::Result;
use crate::types::{ActorId, Order, OrderId, OrderStatistics, OrderStatus};

/// Durable store for orders; the single source of truth.
///
/// # Concurrency
///
/// `save` is an optimistic upsert keyed on [`Order::version`]:
///
/// - `version == 0` inserts a new record
/// - otherwise the stored version must equal `order.version`
///
/// On success the returned order carries `version + 1`. A stale version is
/// rejected with [`OrderError::ConcurrentModification`](crate::OrderError::ConcurrentModification)
/// and nothing is written, so concurrent writers never silently overwrite
/// each other.
pub trait OrderRepository: Send + Sync {
    /// Point lookup.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`](crate::OrderError::Storage) on store failure.
    fn find_by_id(
        &self,
        id: &OrderId,
    ) -> impl std::future::Future<Output = Result<Option<Order>>> + Send;

    /// All orders with the given status.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`](crate::OrderError::Storage) on store failure.
    fn find_by_status(
        &self,
        status: OrderStatus,
    ) -> impl std::future::Future<Output = Result<Vec<Order>>> + Send;

    /// All orders placed by `creator`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`](crate::OrderError::Storage) on store failure.
    fn find_by_creator(
        &self,
        creator: &ActorId,
    ) -> impl std::future::Future<Output = Result<Vec<Order>>> + Send;

    /// Every order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`](crate::OrderError::Storage) on store failure.
    fn find_all(&self) -> impl std::future::Future<Output = Result<Vec<Order>>> + Send;

    /// Optimistic upsert (see trait docs).
    ///
    /// # Errors
    ///
    /// - [`OrderError::ConcurrentModification`](crate::OrderError::ConcurrentModification) on version mismatch
    /// - [`OrderError::Storage`](crate::OrderError::Storage) on store failure
    fn save(&self, order: &Order) -> impl std::future::Future<Output = Result<Order>> + Send;

    /// Number of orders.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`](crate::OrderError::Storage) on store failure.
    fn count(&self) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Number of orders with the given status.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`](crate::OrderError::Storage) on store failure.
    fn count_by_status(
        &self,
        status: OrderStatus,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Counts of all orders by status, taken from one consistent read so
    /// that `total` always equals the sum of the per-status counts.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`](crate::OrderError::Storage) on store failure.
    fn statistics(&self) -> impl std::future::Future<Output = Result<OrderStatistics>> + Send;

    /// Whether `actor` placed the order `order_id`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`](crate::OrderError::Storage) on store failure.
    fn exists_ownership(
        &self,
        actor: &ActorId,
        order_id: &OrderId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}
