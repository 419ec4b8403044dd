//! In-memory implementations of the collaborator traits.
//!
//! Every mock is `Clone` with shared state, so a test can hand one clone to
//! the coordinator and inspect or sabotage the backend through another.

mod cache;
mod clock;
mod identity;
mod lock;
mod repository;

pub use cache::InMemoryOrderCache;
pub use clock::{FixedClock, ManualClock, test_clock, test_epoch};
pub use identity::StaticIdentityProvider;
pub use lock::InMemoryProcessingLock;
pub use repository::InMemoryOrderRepository;
