//! Order state machine.
//!
//! Pure validation and transition logic, no I/O. Each transition validates
//! against the current order and, on success, returns the next version of
//! the order; the input is never mutated, so a rejected transition cannot
//! leak a partial update.
//!
//! ```text
//! READY ──start──▶ IN_PROCESS ──complete──▶ PROCESSED
//!   ▲                  │
//!   └─────reclaim──────┘
//! ```

use crate::error::{OrderError, Result};
use crate::types::{ActorId, Order, OrderStatus};
use chrono::{DateTime, Utc};
use std::fmt;

/// The transitions an order can take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transition {
    /// READY → `IN_PROCESS`
    Start,
    /// `IN_PROCESS` → PROCESSED
    Complete,
    /// `IN_PROCESS` → READY (stale-work reclamation only)
    Reclaim,
}

impl Transition {
    /// Label used in logs and metrics
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Reclaim => "reclaim",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates and applies order status transitions.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Validates a start request.
    ///
    /// # Errors
    ///
    /// - [`OrderError::AlreadyProcessed`] if the order is terminal
    /// - [`OrderError::AlreadyInProcess`] if another actor holds it
    pub const fn validate_start(order: &Order) -> Result<()> {
        match order.status {
            OrderStatus::Ready => Ok(()),
            OrderStatus::InProcess => Err(OrderError::AlreadyInProcess),
            OrderStatus::Processed => Err(OrderError::AlreadyProcessed),
        }
    }

    /// Validates a completion request by `actor`.
    ///
    /// A ready order has no processor, so it reports `NotStarted` rather
    /// than an ownership failure. Otherwise ownership is checked before the
    /// terminal state.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotStarted`] if the order is still ready
    /// - [`OrderError::NotOwner`] if `actor` is not the recorded processor
    /// - [`OrderError::AlreadyProcessed`] if the order is terminal
    pub fn validate_complete(order: &Order, actor: &ActorId) -> Result<()> {
        if order.status == OrderStatus::Ready {
            return Err(OrderError::NotStarted);
        }

        if order.processed_by.as_ref() != Some(actor) {
            return Err(OrderError::NotOwner);
        }

        match order.status {
            OrderStatus::InProcess => Ok(()),
            OrderStatus::Processed => Err(OrderError::AlreadyProcessed),
            OrderStatus::Ready => Err(OrderError::NotStarted),
        }
    }

    /// Validates a reclaim.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotStarted`] if the order is ready
    /// - [`OrderError::AlreadyProcessed`] if the order is terminal
    pub const fn validate_reclaim(order: &Order) -> Result<()> {
        match order.status {
            OrderStatus::InProcess => Ok(()),
            OrderStatus::Ready => Err(OrderError::NotStarted),
            OrderStatus::Processed => Err(OrderError::AlreadyProcessed),
        }
    }

    /// Claims a ready order for `actor`.
    ///
    /// # Errors
    ///
    /// See [`Self::validate_start`].
    pub fn start(order: &Order, actor: &ActorId, now: DateTime<Utc>) -> Result<Order> {
        Self::validate_start(order)?;

        let mut next = order.clone();
        next.status = OrderStatus::InProcess;
        next.processed_by = Some(actor.clone());
        next.updated_at = Some(now);
        Ok(next)
    }

    /// Finishes an order on behalf of its processor.
    ///
    /// # Errors
    ///
    /// See [`Self::validate_complete`].
    pub fn complete(order: &Order, actor: &ActorId, now: DateTime<Utc>) -> Result<Order> {
        Self::validate_complete(order, actor)?;

        let mut next = order.clone();
        next.status = OrderStatus::Processed;
        next.updated_at = Some(now);
        Ok(next)
    }

    /// Reverts an in-process order to ready, unconditionally.
    ///
    /// # Errors
    ///
    /// See [`Self::validate_reclaim`].
    pub fn reclaim(order: &Order) -> Result<Order> {
        Self::validate_reclaim(order)?;

        let mut next = order.clone();
        next.status = OrderStatus::Ready;
        next.processed_by = None;
        next.updated_at = None;
        Ok(next)
    }
}
