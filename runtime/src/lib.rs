//! # Orderflow Runtime
//!
//! The moving parts of order processing, generic over the collaborator
//! traits in [`orderflow_core::providers`].
//!
//! ## Core Components
//!
//! - **[`ProcessingCoordinator`]**: caller-facing operations (placement,
//!   lookups, start/complete processing, statistics)
//! - **[`StaleOrderReclaimer`]**: periodic task reverting abandoned work
//! - **[`Config`]**: environment-driven configuration
//! - **[`metrics`]**: metric names, recorders and the Prometheus exporter
//!
//! ## Example
//!
//! ```
//! use orderflow_core::{Actor, NewOrder, OrderStatus};
//! use orderflow_runtime::{CoordinatorConfig, ProcessingCoordinator};
//! use orderflow_testing::{InMemoryOrderRepository, InMemoryProcessingLock, test_clock};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let coordinator = ProcessingCoordinator::new(
//!     InMemoryOrderRepository::new(),
//!     InMemoryProcessingLock::new(),
//!     None::<orderflow_testing::InMemoryOrderCache>,
//!     Arc::new(test_clock()),
//!     CoordinatorConfig::default(),
//! );
//!
//! let order = coordinator
//!     .place_order(NewOrder::new("Ship widget", None), &Actor::poster("U1"))
//!     .await?;
//! let started = coordinator
//!     .start_processing(&order.id, &Actor::processor("U2"))
//!     .await?;
//! assert_eq!(started.status, OrderStatus::InProcess);
//! # Ok::<(), orderflow_core::OrderError>(())
//! # }).unwrap();
//! ```

/// Environment-driven configuration
pub mod config;

/// Processing coordinator
pub mod coordinator;

/// Prometheus metrics for observability
pub mod metrics;

/// Stale-work reclaimer
pub mod reclaimer;

pub use config::{
    CacheConfig, Config, CoordinatorConfig, DatabaseConfig, ReclaimerConfig, RedisConfig,
    TelemetryConfig,
};
pub use coordinator::ProcessingCoordinator;
pub use reclaimer::{ReclaimReport, StaleOrderReclaimer};
