//! Core domain types for order processing.
//!
//! Orders progress through states: Ready → `InProcess` → Processed, with a
//! single way back (`InProcess` → Ready) reserved for stale-work reclamation.

use crate::error::{FieldViolation, OrderError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum length (in characters) of an order title.
pub const MAX_TITLE_LEN: usize = 255;

/// Maximum length (in characters) of an order description.
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// Unique identifier for an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Generates a fresh random `OrderId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s).map(Self).map_err(|_| {
            OrderError::ValidationFailed(vec![FieldViolation::new(
                "order_id",
                format!("'{s}' is not a valid order id"),
            )])
        })
    }
}

/// Identity of an authenticated actor
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    /// Creates a new `ActorId` from a string
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role an actor plays in the order lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Places orders and may view its own orders
    Poster,
    /// Takes orders through processing
    Processor,
}

impl Role {
    /// Stable string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Poster => "POSTER",
            Self::Processor => "PROCESSOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The calling actor, resolved by the identity provider and passed
/// explicitly to every coordinator operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor identity
    pub id: ActorId,
    /// Actor role
    pub role: Role,
}

impl Actor {
    /// Creates a new actor
    #[must_use]
    pub const fn new(id: ActorId, role: Role) -> Self {
        Self { id, role }
    }

    /// Shorthand for an actor with the poster role
    #[must_use]
    pub fn poster(id: impl Into<String>) -> Self {
        Self::new(ActorId::new(id), Role::Poster)
    }

    /// Shorthand for an actor with the processor role
    #[must_use]
    pub fn processor(id: impl Into<String>) -> Self {
        Self::new(ActorId::new(id), Role::Processor)
    }
}

/// Status of an order in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Waiting for a processor
    Ready,
    /// Claimed by a processor
    InProcess,
    /// Terminal
    Processed,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 3] = [Self::Ready, Self::InProcess, Self::Processed];

    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::InProcess => "IN_PROCESS",
            Self::Processed => "PROCESSED",
        }
    }

    /// Parse status from its string representation.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`] if the string is not a known status,
    /// since only persisted data is ever parsed.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "READY" => Ok(Self::Ready),
            "IN_PROCESS" => Ok(Self::InProcess),
            "PROCESSED" => Ok(Self::Processed),
            _ => Err(OrderError::Storage(format!("Invalid order status: {s}"))),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for placing an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Short title, required
    pub title: String,
    /// Optional free-form description
    pub description: Option<String>,
}

impl NewOrder {
    /// Creates a new order request
    #[must_use]
    pub fn new(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
        }
    }

    /// Validates field bounds, collecting every violation.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::ValidationFailed`] listing each offending field.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();

        if self.title.trim().is_empty() {
            violations.push(FieldViolation::new("title", "Title must not be null"));
        } else if self.title.chars().count() > MAX_TITLE_LEN {
            violations.push(FieldViolation::new(
                "title",
                format!("Title must not be bigger than {MAX_TITLE_LEN} symbols"),
            ));
        }

        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                violations.push(FieldViolation::new(
                    "description",
                    format!("Description must not be bigger than {MAX_DESCRIPTION_LEN} symbols"),
                ));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(OrderError::ValidationFailed(violations))
        }
    }
}

/// A unit of work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Immutable identifier
    pub id: OrderId,
    /// Title given at placement
    pub title: String,
    /// Description given at placement
    pub description: Option<String>,
    /// Current lifecycle status
    pub status: OrderStatus,
    /// Actor that placed the order
    pub created_by: ActorId,
    /// Actor currently (or last) processing the order; `None` while ready
    pub processed_by: Option<ActorId>,
    /// Placement time
    pub created_at: DateTime<Utc>,
    /// Time of the last status-affecting mutation; `None` while ready
    pub updated_at: Option<DateTime<Utc>>,
    /// Store version for optimistic concurrency (0 = never persisted)
    pub version: u64,
}

impl Order {
    /// Builds a ready, unpersisted order placed by `creator`.
    #[must_use]
    pub fn place(id: OrderId, new_order: NewOrder, creator: ActorId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new_order.title,
            description: new_order.description,
            status: OrderStatus::Ready,
            created_by: creator,
            processed_by: None,
            created_at: now,
            updated_at: None,
            version: 0,
        }
    }

    /// Checks the status/processor/timestamp invariants.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match self.status {
            OrderStatus::Ready => self.processed_by.is_none() && self.updated_at.is_none(),
            OrderStatus::InProcess => self.processed_by.is_some(),
            OrderStatus::Processed => self.processed_by.is_some() && self.updated_at.is_some(),
        }
    }

    /// Returns `true` if `actor` placed this order
    #[must_use]
    pub fn is_created_by(&self, actor: &ActorId) -> bool {
        &self.created_by == actor
    }
}

/// Order counts across the whole store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatistics {
    /// All orders
    pub total: u64,
    /// Orders waiting for a processor
    pub ready: u64,
    /// Orders currently claimed
    pub in_process: u64,
    /// Finished orders
    pub processed: u64,
}
