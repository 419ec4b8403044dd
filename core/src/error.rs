//! Error types for order lifecycle operations.

use crate::types::{ActorId, OrderId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for order operations.
pub type Result<T> = std::result::Result<T, OrderError>;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Offending field name
    pub field: String,
    /// Human-readable reason
    pub message: String,
}

impl FieldViolation {
    /// Creates a new violation
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every failure an order operation can surface.
///
/// Variants are grouped by [`ErrorKind`]; callers that only care about the
/// outward signal should match on [`OrderError::kind`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    // ═══════════════════════════════════════════════════════════
    // Not found
    // ═══════════════════════════════════════════════════════════

    /// No order with this id.
    #[error("Order not found")]
    OrderNotFound(OrderId),

    /// The identity provider does not know this actor.
    #[error("User not found")]
    ActorNotFound(ActorId),

    // ═══════════════════════════════════════════════════════════
    // Conflicts
    // ═══════════════════════════════════════════════════════════

    /// The order is already terminal.
    #[error("Order already processed")]
    AlreadyProcessed,

    /// Another actor already claimed the order.
    #[error("Order already is processing by another user")]
    AlreadyInProcess,

    /// Completion was requested for an order nobody started.
    #[error("Processing was not started.")]
    NotStarted,

    /// The processing lock for the order is held by someone else.
    #[error("Order already is processing by another user")]
    AlreadyLocked,

    /// The stored order changed since it was read.
    #[error("Order {order_id} was modified concurrently")]
    ConcurrentModification {
        /// Order whose write was rejected
        order_id: OrderId,
    },

    // ═══════════════════════════════════════════════════════════
    // Forbidden
    // ═══════════════════════════════════════════════════════════

    /// The acting actor is not the order's processor.
    #[error("You cannot complete processing for this order")]
    NotOwner,

    /// The acting actor's role does not allow the operation.
    #[error("Access denied: requires {required}")]
    AccessDenied {
        /// Capability that was missing
        required: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════

    /// Malformed input.
    #[error("Validation failed: {}", join_violations(.0))]
    ValidationFailed(Vec<FieldViolation>),

    // ═══════════════════════════════════════════════════════════
    // Internal
    // ═══════════════════════════════════════════════════════════

    /// Durable store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Lock service failure.
    #[error("Lock service error: {0}")]
    LockService(String),

    /// Order cache failure.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Anything else unexpected.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coarse error taxonomy, one stable outward signal per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Order or actor absent
    NotFound,
    /// Business-rule conflict with the current order state
    Conflict,
    /// Caller may not perform the operation
    Forbidden,
    /// Malformed input
    ValidationFailed,
    /// Unexpected infrastructure failure
    Internal,
}

impl ErrorKind {
    /// HTTP-style status code used as the outward signal.
    ///
    /// # Examples
    ///
    /// ```
    /// # use orderflow_core::ErrorKind;
    /// assert_eq!(ErrorKind::Conflict.status_code(), 409);
    /// assert_eq!(ErrorKind::Forbidden.status_code(), 403);
    /// ```
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Forbidden => 403,
            Self::ValidationFailed => 400,
            Self::Internal => 500,
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Forbidden => "forbidden",
            Self::ValidationFailed => "validation_failed",
            Self::Internal => "internal",
        }
    }

    /// Returns `true` if repeating the same request can never succeed.
    ///
    /// Conflicts and internal failures may clear up later; the rest will not.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::NotFound | Self::Forbidden | Self::ValidationFailed)
    }
}

impl OrderError {
    /// Maps this error onto the taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::OrderNotFound(_) | Self::ActorNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyProcessed
            | Self::AlreadyInProcess
            | Self::NotStarted
            | Self::AlreadyLocked
            | Self::ConcurrentModification { .. } => ErrorKind::Conflict,
            Self::NotOwner | Self::AccessDenied { .. } => ErrorKind::Forbidden,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::Storage(_) | Self::LockService(_) | Self::Cache(_) | Self::Internal(_) => {
                ErrorKind::Internal
            },
        }
    }

    /// Returns `true` for business-rule rejections (never retried by the core).
    #[must_use]
    pub const fn is_business_rejection(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Internal)
    }
}
