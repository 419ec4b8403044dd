//! # Orderflow Testing
//!
//! Test doubles and fixtures for the Orderflow crates.
//!
//! This crate provides:
//! - In-memory implementations of every collaborator trait ([`mocks`])
//! - Deterministic clocks
//! - Order fixtures in each lifecycle state ([`fixtures`])
//! - proptest strategies for domain inputs ([`properties`])
//!
//! ## Example
//!
//! ```
//! use orderflow_core::providers::OrderRepository;
//! use orderflow_testing::{InMemoryOrderRepository, fixtures};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let repository = InMemoryOrderRepository::new();
//! let saved = repository.save(&fixtures::ready_order("U1")).await?;
//! assert_eq!(saved.version, 1);
//! # Ok::<(), orderflow_core::OrderError>(())
//! # }).unwrap();
//! ```

pub mod mocks;

/// Order fixtures in each lifecycle state.
///
/// All fixtures are placed at [`test_epoch`] and carry version 0, so they
/// can be passed to `save` as new records or to
/// [`InMemoryOrderRepository::seed`].
pub mod fixtures {
    use super::mocks::test_epoch;
    use chrono::{DateTime, Utc};
    use orderflow_core::{ActorId, NewOrder, Order, OrderId, OrderStatus};

    /// A ready order placed by `creator`.
    #[must_use]
    pub fn ready_order(creator: &str) -> Order {
        Order::place(
            OrderId::new(),
            NewOrder::new("Ship widget", Some("Two boxes, fragile".to_string())),
            ActorId::new(creator),
            test_epoch(),
        )
    }

    /// An order placed by `creator` and claimed by `processor` at `started_at`.
    #[must_use]
    pub fn in_process_order(creator: &str, processor: &str, started_at: DateTime<Utc>) -> Order {
        let mut order = ready_order(creator);
        order.status = OrderStatus::InProcess;
        order.processed_by = Some(ActorId::new(processor));
        order.updated_at = Some(started_at);
        order
    }

    /// An order finished by `processor` at `finished_at`.
    #[must_use]
    pub fn processed_order(creator: &str, processor: &str, finished_at: DateTime<Utc>) -> Order {
        let mut order = in_process_order(creator, processor, finished_at);
        order.status = OrderStatus::Processed;
        order
    }

    /// Install a test-friendly tracing subscriber.
    ///
    /// Safe to call from every test; only the first call installs it.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }
}

/// proptest strategies for domain inputs.
pub mod properties {
    use orderflow_core::NewOrder;
    use orderflow_core::types::{MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};
    use proptest::prelude::*;

    /// Order requests that pass validation.
    pub fn valid_new_order() -> impl Strategy<Value = NewOrder> {
        (
            "[a-zA-Z0-9][a-zA-Z0-9 ]{0,254}",
            proptest::option::of(
                proptest::collection::vec(any::<char>(), 0..=MAX_DESCRIPTION_LEN)
                    .prop_map(|chars| chars.into_iter().collect::<String>()),
            ),
        )
            .prop_map(|(title, description)| NewOrder::new(title, description))
    }

    /// Titles that are empty, blank, or longer than allowed.
    pub fn invalid_title() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[ \t]{1,8}",
            proptest::collection::vec("[a-z]", (MAX_TITLE_LEN + 1)..(MAX_TITLE_LEN * 2))
                .prop_map(|chars| chars.concat()),
        ]
    }
}

// Re-export commonly used items
pub use mocks::{
    FixedClock, InMemoryOrderCache, InMemoryOrderRepository, InMemoryProcessingLock, ManualClock,
    StaticIdentityProvider, test_clock, test_epoch,
};

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use orderflow_core::environment::Clock;
    use proptest::prelude::*;

    #[test]
    fn fixtures_are_consistent() {
        let at = test_clock().now();
        assert!(fixtures::ready_order("U1").is_consistent());
        assert!(fixtures::in_process_order("U1", "U2", at).is_consistent());
        assert!(fixtures::processed_order("U1", "U2", at).is_consistent());
    }

    proptest! {
        #[test]
        fn valid_orders_validate(order in properties::valid_new_order()) {
            prop_assert!(order.validate().is_ok());
        }

        #[test]
        fn invalid_titles_are_rejected(title in properties::invalid_title()) {
            prop_assert!(orderflow_core::NewOrder::new(title, None).validate().is_err());
        }
    }
}
