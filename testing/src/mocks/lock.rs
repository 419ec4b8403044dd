//! In-memory processing lock.

use orderflow_core::providers::ProcessingLock;
use orderflow_core::{OrderError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Lease {
    holder: String,
    expires_at: Instant,
}

/// In-memory lock with holder tokens and TTL expiry.
///
/// Expiry uses the monotonic clock, so a lease taken with a short TTL
/// really does lapse while a test sleeps.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessingLock {
    leases: Arc<Mutex<HashMap<String, Lease>>>,
    fail_acquire: Arc<AtomicBool>,
    fail_release: Arc<AtomicBool>,
    fail_probe: Arc<AtomicBool>,
    releases: Arc<AtomicUsize>,
}

impl InMemoryProcessingLock {
    /// Create a lock with no leases
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `key` on behalf of an outside party, regardless of current state.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::LockService`] if the internal mutex is poisoned.
    pub fn hold(&self, key: &str, holder: &str, ttl: Duration) -> Result<()> {
        self.lock_leases()?.insert(
            key.to_string(),
            Lease {
                holder: holder.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    /// Current holder of `key`, ignoring expired leases.
    #[must_use]
    pub fn holder(&self, key: &str) -> Option<String> {
        let leases = self.leases.lock().ok()?;
        leases
            .get(key)
            .filter(|lease| lease.expires_at > Instant::now())
            .map(|lease| lease.holder.clone())
    }

    /// Number of release calls that reached the backend.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Make `try_acquire` fail with a lock-service error.
    pub fn fail_acquire(&self, fail: bool) {
        self.fail_acquire.store(fail, Ordering::SeqCst);
    }

    /// Make `release` fail with a lock-service error.
    pub fn fail_release(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }

    /// Make `is_held` fail with a lock-service error.
    pub fn fail_probe(&self, fail: bool) {
        self.fail_probe.store(fail, Ordering::SeqCst);
    }

    fn lock_leases(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Lease>>> {
        self.leases
            .lock()
            .map_err(|_| OrderError::LockService("Mutex lock failed".into()))
    }

    fn injected(flag: &AtomicBool, operation: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(OrderError::LockService(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

impl ProcessingLock for InMemoryProcessingLock {
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool> {
        Self::injected(&self.fail_acquire, "acquire")?;

        let now = Instant::now();
        let mut leases = self.lock_leases()?;
        if leases.get(key).is_some_and(|lease| lease.expires_at > now) {
            return Ok(false);
        }

        leases.insert(
            key.to_string(),
            Lease {
                holder: holder.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, holder: &str) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Self::injected(&self.fail_release, "release")?;

        let mut leases = self.lock_leases()?;
        if leases.get(key).is_some_and(|lease| lease.holder == holder) {
            leases.remove(key);
        }
        Ok(())
    }

    async fn is_held(&self, key: &str) -> Result<bool> {
        Self::injected(&self.fail_probe, "probe")?;

        let leases = self.lock_leases()?;
        Ok(leases
            .get(key)
            .is_some_and(|lease| lease.expires_at > Instant::now()))
    }
}
