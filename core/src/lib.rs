//! # Orderflow Core
//!
//! Types and rules for coordinating exclusive, multi-party progression of
//! orders through a fixed lifecycle.
//!
//! This crate contains no I/O:
//!
//! - [`types`]: `Order`, identities, statuses, statistics
//! - [`state_machine`]: the legal transitions and their failures
//! - [`policy`]: role-based capability checks
//! - [`error`]: the error taxonomy shared by every crate
//! - [`providers`]: traits for the store, lock, cache and identity collaborators
//! - [`environment`]: injected clock
//!
//! ## Example
//!
//! ```
//! use orderflow_core::{ActorId, NewOrder, Order, OrderId, OrderStateMachine, OrderStatus};
//! use chrono::Utc;
//!
//! let order = Order::place(
//!     OrderId::new(),
//!     NewOrder::new("Ship widget", None),
//!     ActorId::new("U1"),
//!     Utc::now(),
//! );
//!
//! let started = OrderStateMachine::start(&order, &ActorId::new("U2"), Utc::now())?;
//! assert_eq!(started.status, OrderStatus::InProcess);
//! # Ok::<(), orderflow_core::OrderError>(())
//! ```

pub mod environment;
pub mod error;
pub mod policy;
pub mod providers;
pub mod state_machine;
pub mod types;

// Re-export main types for convenience
pub use error::{ErrorKind, FieldViolation, OrderError, Result};
pub use policy::{AccessPolicy, Capability};
pub use state_machine::{OrderStateMachine, Transition};
pub use types::{
    Actor, ActorId, NewOrder, Order, OrderId, OrderStatistics, OrderStatus, Role,
};
