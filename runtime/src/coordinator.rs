//! Processing coordinator.
//!
//! The coordinator is the only caller-facing entry point. Every operation
//! takes the acting [`Actor`] explicitly, checks it against the
//! [`AccessPolicy`], and only then touches the store, the lock or the state
//! machine.
//!
//! # Start processing
//!
//! Two guards protect the `READY → IN_PROCESS` transition:
//!
//! 1. The processing lock: a fast-fail probe followed by an atomic
//!    conditional acquire. It narrows the race window but is advisory.
//! 2. The authoritative state check on a freshly loaded order, persisted
//!    with a versioned write. A racing writer makes the save conflict, the
//!    order is reloaded once, and the loser sees `AlreadyInProcess`.
//!
//! Unless the acquire reports the lock as taken, release runs on every exit
//! path; it is owner-checked, so it never frees someone else's lease.
//! Lock-service failures are logged and tolerated; the second guard still
//! holds without the first.
//!
//! # Cache
//!
//! Fresh orders are written to the [`OrderCache`] after each successful
//! store write, and [`ProcessingCoordinator::get_by_id`] reads through it.
//! Cache failures are logged and never fail an operation.
//!
//! A failed cache write must not leave the previous copy visible: the entry
//! is evicted, and if the eviction fails too the order is read from the
//! store until a later cache write for it succeeds.

use crate::config::CoordinatorConfig;
use crate::metrics::CoordinatorMetrics;
use chrono::{DateTime, Utc};
use orderflow_core::environment::Clock;
use orderflow_core::providers::{OrderCache, OrderRepository, ProcessingLock, processing_lock_key};
use orderflow_core::{
    AccessPolicy, Actor, Capability, NewOrder, Order, OrderError, OrderId, OrderStateMachine,
    OrderStatistics, OrderStatus, Result, Role, Transition,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Orchestrates order placement, lookups and the caller-facing transitions.
///
/// # Type Parameters
///
/// - `R`: durable store
/// - `L`: processing lock
/// - `C`: order cache (`Option<C>` disables caching)
pub struct ProcessingCoordinator<R, L, C> {
    repository: R,
    lock: L,
    cache: C,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    /// Orders whose cached copy could be neither refreshed nor evicted.
    uncached: Mutex<HashSet<OrderId>>,
}

impl<R, L, C> ProcessingCoordinator<R, L, C>
where
    R: OrderRepository,
    L: ProcessingLock,
    C: OrderCache,
{
    /// Create a coordinator over the given collaborators.
    #[must_use]
    pub fn new(
        repository: R,
        lock: L,
        cache: C,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            repository,
            lock,
            cache,
            clock,
            config,
            uncached: Mutex::new(HashSet::new()),
        }
    }

    /// Place a new ready order on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// - [`OrderError::AccessDenied`] unless `actor` is a poster
    /// - [`OrderError::ValidationFailed`] for a malformed request
    /// - [`OrderError::Storage`] if the store write fails
    #[tracing::instrument(skip(self, new_order, actor), fields(actor = %actor.id))]
    pub async fn place_order(&self, new_order: NewOrder, actor: &Actor) -> Result<Order> {
        let result: Result<Order> = async {
            AccessPolicy::require(actor, Capability::PostOrder)?;
            new_order.validate()?;

            let order = Order::place(OrderId::new(), new_order, actor.id.clone(), self.clock.now());
            let saved = self.repository.save(&order).await?;
            self.populate_cache(&saved).await;
            Ok(saved)
        }
        .await;

        if let Ok(order) = &result {
            CoordinatorMetrics::record_placed();
            info!(order_id = %order.id, "Order placed");
        }
        observe("place_order", result)
    }

    /// Look up one order.
    ///
    /// Processors may read any order; posters only the orders they placed.
    ///
    /// # Errors
    ///
    /// - [`OrderError::AccessDenied`] if `actor` is neither a processor nor the creator
    /// - [`OrderError::OrderNotFound`] if no such order exists
    /// - [`OrderError::Storage`] on store failure
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn get_by_id(&self, order_id: &OrderId, actor: &Actor) -> Result<Order> {
        let result: Result<Order> = async {
            let is_owner = match actor.role {
                Role::Processor => false,
                Role::Poster => {
                    self.repository.exists_ownership(&actor.id, order_id).await?
                },
            };
            AccessPolicy::require(actor, Capability::ViewOrder { is_owner })?;

            if self.bypasses_cache(order_id) {
                debug!(%order_id, "Cached copy may be stale, using store");
            } else {
                match self.cache.get(order_id).await {
                    Ok(Some(order)) => {
                        debug!(%order_id, "Order cache hit");
                        return Ok(order);
                    },
                    Ok(None) => debug!(%order_id, "Order cache miss"),
                    Err(e) => warn!(%order_id, error = %e, "Order cache read failed, using store"),
                }
            }

            let order = self.load(order_id).await?;
            self.populate_cache(&order).await;
            Ok(order)
        }
        .await;

        observe("get_by_id", result)
    }

    /// Orders visible to `actor`: its own for a poster, all for a processor.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`] on store failure.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn list_orders(&self, actor: &Actor) -> Result<Vec<Order>> {
        let result = if AccessPolicy::allows(actor, Capability::ProcessOrder) {
            self.repository.find_all().await
        } else {
            self.repository.find_by_creator(&actor.id).await
        };
        observe("list_orders", result)
    }

    /// Orders waiting for a processor.
    ///
    /// # Errors
    ///
    /// - [`OrderError::AccessDenied`] unless `actor` is a processor
    /// - [`OrderError::Storage`] on store failure
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn list_ready_to_process(&self, actor: &Actor) -> Result<Vec<Order>> {
        let result = self.list_by_status(actor, OrderStatus::Ready).await;
        observe("list_ready_to_process", result)
    }

    /// Orders currently being processed.
    ///
    /// # Errors
    ///
    /// - [`OrderError::AccessDenied`] unless `actor` is a processor
    /// - [`OrderError::Storage`] on store failure
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn list_in_process(&self, actor: &Actor) -> Result<Vec<Order>> {
        let result = self.list_by_status(actor, OrderStatus::InProcess).await;
        observe("list_in_process", result)
    }

    /// Claim a ready order for `actor`.
    ///
    /// # Errors
    ///
    /// - [`OrderError::AccessDenied`] unless `actor` is a processor
    /// - [`OrderError::AlreadyLocked`] if another start attempt holds the lock
    /// - [`OrderError::OrderNotFound`] if no such order exists
    /// - [`OrderError::AlreadyInProcess`] / [`OrderError::AlreadyProcessed`]
    ///   if the order is not ready
    /// - [`OrderError::Storage`] on store failure
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn start_processing(&self, order_id: &OrderId, actor: &Actor) -> Result<Order> {
        let result: Result<Order> = async {
            AccessPolicy::require(actor, Capability::ProcessOrder)?;

            let key = processing_lock_key(order_id);
            match self.lock.is_held(&key).await {
                Ok(true) => {
                    CoordinatorMetrics::record_contention();
                    return Err(OrderError::AlreadyLocked);
                },
                Ok(false) => {},
                Err(e) => warn!(%order_id, error = %e, "Lock probe failed, relying on state check"),
            }

            let holder = Uuid::new_v4().to_string();
            match self.lock.try_acquire(&key, &holder, self.config.lock_ttl).await {
                Ok(true) => debug!(%order_id, %holder, "Processing lock acquired"),
                Ok(false) => {
                    CoordinatorMetrics::record_contention();
                    return Err(OrderError::AlreadyLocked);
                },
                Err(e) => {
                    warn!(%order_id, error = %e, "Lock acquire failed, relying on state check");
                },
            }

            let outcome = self
                .transition(order_id, Transition::Start, |order, now| {
                    OrderStateMachine::start(order, &actor.id, now)
                })
                .await;

            if let Err(e) = self.lock.release(&key, &holder).await {
                warn!(%order_id, %holder, error = %e, "Failed to release processing lock");
            }

            outcome
        }
        .await;

        observe("start_processing", result)
    }

    /// Finish an order on behalf of its processor.
    ///
    /// No lock is taken: only the recorded processor can complete, and the
    /// versioned write rejects a racing reclaim.
    ///
    /// # Errors
    ///
    /// - [`OrderError::AccessDenied`] unless `actor` is a processor
    /// - [`OrderError::OrderNotFound`] if no such order exists
    /// - [`OrderError::NotStarted`] if the order is still ready
    /// - [`OrderError::NotOwner`] if `actor` is not the processor
    /// - [`OrderError::AlreadyProcessed`] if the order is terminal
    /// - [`OrderError::Storage`] on store failure
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn complete_processing(&self, order_id: &OrderId, actor: &Actor) -> Result<Order> {
        let result: Result<Order> = async {
            AccessPolicy::require(actor, Capability::ProcessOrder)?;
            self.transition(order_id, Transition::Complete, |order, now| {
                OrderStateMachine::complete(order, &actor.id, now)
            })
            .await
        }
        .await;

        observe("complete_processing", result)
    }

    /// Order counts by status across the whole store, read in one go.
    ///
    /// # Errors
    ///
    /// - [`OrderError::AccessDenied`] unless `actor` is a processor
    /// - [`OrderError::Storage`] on store failure
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn statistics(&self, actor: &Actor) -> Result<OrderStatistics> {
        let result: Result<OrderStatistics> = async {
            AccessPolicy::require(actor, Capability::ProcessOrder)?;
            self.repository.statistics().await
        }
        .await;

        observe("statistics", result)
    }

    /// Whether `actor` placed `order_id`. Open to every actor.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`] on store failure.
    pub async fn is_order_owner(&self, order_id: &OrderId, actor: &Actor) -> Result<bool> {
        self.repository.exists_ownership(&actor.id, order_id).await
    }

    async fn list_by_status(&self, actor: &Actor, status: OrderStatus) -> Result<Vec<Order>> {
        AccessPolicy::require(actor, Capability::ProcessOrder)?;
        self.repository.find_by_status(status).await
    }

    async fn load(&self, order_id: &OrderId) -> Result<Order> {
        self.repository
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(*order_id))
    }

    /// Load, apply, persist. A version conflict reloads and re-validates
    /// once, so a lost race surfaces as the business rejection it implies.
    async fn transition<F>(&self, order_id: &OrderId, transition: Transition, apply: F) -> Result<Order>
    where
        F: Fn(&Order, DateTime<Utc>) -> Result<Order> + Send + Sync,
    {
        let mut reloaded = false;
        loop {
            let current = self.load(order_id).await?;
            let next = apply(&current, self.clock.now())?;

            match self.repository.save(&next).await {
                Ok(saved) => {
                    CoordinatorMetrics::record_transition(transition);
                    info!(
                        %order_id,
                        %transition,
                        status = %saved.status,
                        processed_by = ?saved.processed_by.as_ref().map(ToString::to_string),
                        "Order transitioned"
                    );
                    self.populate_cache(&saved).await;
                    return Ok(saved);
                },
                Err(OrderError::ConcurrentModification { .. }) if !reloaded => {
                    debug!(%order_id, %transition, "Order changed underneath, re-validating");
                    reloaded = true;
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn populate_cache(&self, order: &Order) {
        let Err(e) = self.cache.put(order).await else {
            self.set_bypass(&order.id, false);
            return;
        };
        warn!(order_id = %order.id, error = %e, "Failed to cache order, evicting");

        match self.cache.evict(&order.id).await {
            Ok(()) => self.set_bypass(&order.id, false),
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    error = %e,
                    "Failed to evict order, reading it from the store until recached"
                );
                self.set_bypass(&order.id, true);
            },
        }
    }

    fn bypasses_cache(&self, order_id: &OrderId) -> bool {
        self.uncached
            .lock()
            .map_or(true, |uncached| uncached.contains(order_id))
    }

    fn set_bypass(&self, order_id: &OrderId, bypass: bool) {
        if let Ok(mut uncached) = self.uncached.lock() {
            if bypass {
                uncached.insert(*order_id);
            } else {
                uncached.remove(order_id);
            }
        }
    }
}

/// Record and log a failed operation; pass the result through untouched.
fn observe<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        let kind = e.kind();
        CoordinatorMetrics::record_rejection(kind);
        if e.is_business_rejection() {
            warn!(operation, kind = kind.as_str(), error = %e, "Operation rejected");
        } else {
            warn!(operation, error = %e, "Operation failed");
        }
    }
    result
}
