//! Distributed per-order mutual exclusion.

use crate::error::Result;
use crate::types::OrderId;
use std::time::Duration;

/// Lock key for an order, shared with any co-deployed lock infrastructure.
///
/// # Examples
///
/// ```
/// use orderflow_core::{OrderId, providers::processing_lock_key};
///
/// let id = OrderId::new();
/// assert_eq!(processing_lock_key(&id), format!("orderLock:{id}"));
/// ```
#[must_use]
pub fn processing_lock_key(order_id: &OrderId) -> String {
    format!("orderLock:{order_id}")
}

/// Named advisory lock visible to every coordinator instance.
///
/// The lock narrows the window in which two actors can both observe a ready
/// order; the persisted status stays authoritative. Locks carry the
/// `holder` token of whoever acquired them and a TTL, so a crashed holder
/// cannot starve an order forever.
pub trait ProcessingLock: Send + Sync {
    /// Atomically acquires `key` for `holder` if nobody holds it.
    ///
    /// Returns `Ok(false)` when the lock is already held.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::LockService`](crate::OrderError::LockService) if the lock backend fails.
    fn try_acquire(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Releases `key` if it is still held by `holder`; otherwise does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::LockService`](crate::OrderError::LockService) if the lock backend fails.
    fn release(
        &self,
        key: &str,
        holder: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Whether anyone currently holds `key`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::LockService`](crate::OrderError::LockService) if the lock backend fails.
    fn is_held(&self, key: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
}
