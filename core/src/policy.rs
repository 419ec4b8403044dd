//! Role-based access checks.
//!
//! The coordinator calls [`AccessPolicy::require`] before touching the store
//! or the state machine.

use crate::error::{OrderError, Result};
use crate::types::{Actor, Role};

/// Something an actor may be allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    /// Place new orders
    PostOrder,
    /// List queues, start/complete processing, read statistics
    ProcessOrder,
    /// Read a single order
    ViewOrder {
        /// Whether the actor placed the order
        is_owner: bool,
    },
}

impl Capability {
    const fn description(self) -> &'static str {
        match self {
            Self::PostOrder => "POSTER role",
            Self::ProcessOrder => "PROCESSOR role",
            Self::ViewOrder { .. } => "PROCESSOR role or order ownership",
        }
    }
}

/// Explicit capability policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    /// Returns `true` if `actor` holds `capability`.
    #[must_use]
    pub fn allows(actor: &Actor, capability: Capability) -> bool {
        match capability {
            Capability::PostOrder => actor.role == Role::Poster,
            Capability::ProcessOrder => actor.role == Role::Processor,
            Capability::ViewOrder { is_owner } => actor.role == Role::Processor || is_owner,
        }
    }

    /// Fails unless `actor` holds `capability`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::AccessDenied`] naming the missing capability.
    pub fn require(actor: &Actor, capability: Capability) -> Result<()> {
        if Self::allows(actor, capability) {
            Ok(())
        } else {
            Err(OrderError::AccessDenied {
                required: capability.description().to_string(),
            })
        }
    }
}
