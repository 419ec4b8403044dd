//! Identity of the calling actor.

use crate::error::Result;
use crate::types::Actor;

/// Resolves who is calling.
///
/// The surrounding shell (token verification, sessions) implements this;
/// the resolved [`Actor`] is then passed explicitly to every coordinator
/// operation.
pub trait IdentityProvider: Send + Sync {
    /// The actor behind the current request.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::ActorNotFound`](crate::OrderError::ActorNotFound) if the
    /// authenticated identity no longer maps to a known actor.
    fn current_actor(&self) -> impl std::future::Future<Output = Result<Actor>> + Send;
}
