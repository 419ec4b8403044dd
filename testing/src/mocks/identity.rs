//! Static identity provider.

use orderflow_core::providers::IdentityProvider;
use orderflow_core::{Actor, ActorId, OrderError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Identity provider backed by a fixed directory of actors.
///
/// [`sign_in`](Self::sign_in) selects who is calling; an id that is not in
/// the directory resolves to [`OrderError::ActorNotFound`].
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    directory: Arc<Mutex<HashMap<ActorId, Actor>>>,
    current: Arc<Mutex<Option<ActorId>>>,
}

impl StaticIdentityProvider {
    /// Create a provider knowing `actors`, with nobody signed in.
    #[must_use]
    pub fn new(actors: impl IntoIterator<Item = Actor>) -> Self {
        let directory = actors.into_iter().map(|a| (a.id.clone(), a)).collect();
        Self {
            directory: Arc::new(Mutex::new(directory)),
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Make `id` the calling actor.
    pub fn sign_in(&self, id: impl Into<String>) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(ActorId::new(id));
        }
    }

    /// Remove an actor from the directory, as if the account were deleted.
    pub fn forget(&self, id: &ActorId) {
        if let Ok(mut directory) = self.directory.lock() {
            directory.remove(id);
        }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    async fn current_actor(&self) -> Result<Actor> {
        let current = self
            .current
            .lock()
            .map_err(|_| OrderError::Internal("Mutex lock failed".into()))?
            .clone()
            .ok_or_else(|| OrderError::Internal("no actor signed in".into()))?;

        let directory = self
            .directory
            .lock()
            .map_err(|_| OrderError::Internal("Mutex lock failed".into()))?;
        directory
            .get(&current)
            .cloned()
            .ok_or(OrderError::ActorNotFound(current))
    }
}
