//! Collaborator interfaces.
//!
//! The coordinator and the reclaimer depend on these traits; backends
//! (PostgreSQL, Redis) and the in-memory test doubles implement them.
//!
//! ```text
//!                 ┌────────────────────────┐
//!  caller ──────▶ │ ProcessingCoordinator  │
//!                 └───┬──────────┬─────────┘
//!                     │          │
//!         ┌───────────▼──┐   ┌───▼────────────┐   ┌─────────────┐
//!         │ProcessingLock│   │OrderRepository │◀──│  Reclaimer  │
//!         │  (advisory)  │   │(source of truth)│  └─────────────┘
//!         └──────────────┘   └────────────────┘
//! ```
//!
//! Traits use `impl Future + Send` returns, so they are used through
//! generics rather than trait objects.

pub mod identity;
pub mod order_cache;
pub mod order_repository;
pub mod processing_lock;

pub use identity::IdentityProvider;
pub use order_cache::OrderCache;
pub use order_repository::OrderRepository;
pub use processing_lock::{ProcessingLock, processing_lock_key};
