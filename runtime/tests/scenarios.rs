//! End-to-end scenarios over in-memory collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use chrono::TimeDelta;
use orderflow_core::providers::IdentityProvider;
use orderflow_core::{Actor, ErrorKind, NewOrder, OrderError, OrderStatus};
use orderflow_runtime::{
    CoordinatorConfig, ProcessingCoordinator, ReclaimReport, ReclaimerConfig, StaleOrderReclaimer,
};
use orderflow_testing::fixtures::init_test_tracing;
use orderflow_testing::{
    InMemoryOrderCache, InMemoryOrderRepository, InMemoryProcessingLock, ManualClock,
    StaticIdentityProvider, test_epoch,
};
use std::sync::Arc;
use std::time::Duration;

const THRESHOLD: Duration = Duration::from_secs(60);

struct World {
    coordinator:
        ProcessingCoordinator<InMemoryOrderRepository, InMemoryProcessingLock, InMemoryOrderCache>,
    reclaimer: StaleOrderReclaimer<InMemoryOrderRepository, InMemoryOrderCache>,
    repository: InMemoryOrderRepository,
    cache: InMemoryOrderCache,
    identity: StaticIdentityProvider,
    clock: ManualClock,
}

fn world() -> World {
    init_test_tracing();

    let repository = InMemoryOrderRepository::new();
    let cache = InMemoryOrderCache::new();
    let clock = ManualClock::new(test_epoch());
    let identity = StaticIdentityProvider::new([
        Actor::poster("U1"),
        Actor::processor("U2"),
        Actor::processor("U3"),
    ]);

    World {
        coordinator: ProcessingCoordinator::new(
            repository.clone(),
            InMemoryProcessingLock::new(),
            cache.clone(),
            Arc::new(clock.clone()),
            CoordinatorConfig::default(),
        ),
        reclaimer: StaleOrderReclaimer::new(
            repository.clone(),
            cache.clone(),
            Arc::new(clock.clone()),
            ReclaimerConfig::default().with_stale_after(THRESHOLD),
        ),
        repository,
        cache,
        identity,
        clock,
    }
}

impl World {
    async fn as_actor(&self, id: &str) -> Actor {
        self.identity.sign_in(id);
        self.identity.current_actor().await.unwrap()
    }
}

#[tokio::test]
async fn scenario_a_second_start_conflicts() {
    let w = world();

    let u1 = w.as_actor("U1").await;
    let placed = w
        .coordinator
        .place_order(NewOrder::new("Ship widget", None), &u1)
        .await
        .unwrap();
    assert_eq!(placed.status, OrderStatus::Ready);
    assert_eq!(placed.created_by.as_str(), "U1");
    assert_eq!(placed.processed_by, None);

    w.clock.advance(TimeDelta::seconds(5));
    let u2 = w.as_actor("U2").await;
    let started = w.coordinator.start_processing(&placed.id, &u2).await.unwrap();
    assert_eq!(started.status, OrderStatus::InProcess);
    assert_eq!(started.processed_by.as_ref().unwrap().as_str(), "U2");
    assert_eq!(started.updated_at, Some(test_epoch() + TimeDelta::seconds(5)));

    // U1 is a poster; give the second attempt a processor role so it reaches the state check.
    let second = Actor::processor("U1");
    let err = w.coordinator.start_processing(&placed.id, &second).await.unwrap_err();
    assert_eq!(err, OrderError::AlreadyInProcess);
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(w.repository.get(&placed.id).unwrap(), started);
}

#[tokio::test]
async fn scenario_a_poster_cannot_start() {
    let w = world();
    let u1 = w.as_actor("U1").await;
    let placed = w
        .coordinator
        .place_order(NewOrder::new("Ship widget", None), &u1)
        .await
        .unwrap();

    let err = w.coordinator.start_processing(&placed.id, &u1).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(w.repository.get(&placed.id).unwrap(), placed);
}

#[tokio::test]
async fn scenario_b_stale_order_is_reclaimed() {
    let w = world();
    let u1 = w.as_actor("U1").await;
    let u2 = w.as_actor("U2").await;
    let placed = w
        .coordinator
        .place_order(NewOrder::new("Ship widget", None), &u1)
        .await
        .unwrap();
    let started = w.coordinator.start_processing(&placed.id, &u2).await.unwrap();
    let t = started.updated_at.unwrap();

    w.clock.set(t + TimeDelta::from_std(THRESHOLD).unwrap() + TimeDelta::seconds(1));
    let report = w.reclaimer.run_once().await.unwrap();

    assert_eq!(
        report,
        ReclaimReport {
            scanned: 1,
            reclaimed: 1,
            skipped: 0,
            failed: 0,
        }
    );
    let reclaimed = w.repository.get(&placed.id).unwrap();
    assert_eq!(reclaimed.status, OrderStatus::Ready);
    assert_eq!(reclaimed.processed_by, None);
    assert_eq!(reclaimed.updated_at, None);
    assert_eq!(reclaimed.created_by, placed.created_by);
    assert_eq!(reclaimed.created_at, placed.created_at);
    assert_eq!(w.cache.cached(&placed.id), Some(reclaimed.clone()));

    // A reclaimed order can be claimed again.
    let u3 = w.as_actor("U3").await;
    let restarted = w.coordinator.start_processing(&placed.id, &u3).await.unwrap();
    assert_eq!(restarted.processed_by.unwrap().as_str(), "U3");
}

#[tokio::test]
async fn scenario_b_order_at_threshold_is_kept() {
    let w = world();
    let u1 = w.as_actor("U1").await;
    let u2 = w.as_actor("U2").await;
    let placed = w
        .coordinator
        .place_order(NewOrder::new("Ship widget", None), &u1)
        .await
        .unwrap();
    let started = w.coordinator.start_processing(&placed.id, &u2).await.unwrap();

    w.clock.advance(TimeDelta::from_std(THRESHOLD).unwrap());
    let report = w.reclaimer.run_once().await.unwrap();

    assert_eq!(report.reclaimed, 0);
    assert_eq!(w.repository.get(&placed.id).unwrap(), started);
}

#[tokio::test]
async fn scenario_c_only_processor_completes() {
    let w = world();
    let u1 = w.as_actor("U1").await;
    let u2 = w.as_actor("U2").await;
    let u3 = w.as_actor("U3").await;
    let placed = w
        .coordinator
        .place_order(NewOrder::new("Ship widget", None), &u1)
        .await
        .unwrap();
    let started = w.coordinator.start_processing(&placed.id, &u2).await.unwrap();

    let err = w.coordinator.complete_processing(&placed.id, &u3).await.unwrap_err();
    assert_eq!(err, OrderError::NotOwner);
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(w.repository.get(&placed.id).unwrap(), started);

    w.clock.advance(TimeDelta::seconds(10));
    let done = w.coordinator.complete_processing(&placed.id, &u2).await.unwrap();
    assert_eq!(done.status, OrderStatus::Processed);
    assert_eq!(done.processed_by.as_ref().unwrap().as_str(), "U2");
    assert!(done.updated_at.unwrap() >= started.updated_at.unwrap());

    // Processed orders are terminal, even for the reclaimer.
    w.clock.advance(TimeDelta::hours(1));
    assert_eq!(w.reclaimer.run_once().await.unwrap().scanned, 0);
    assert_eq!(
        w.coordinator.start_processing(&placed.id, &u3).await,
        Err(OrderError::AlreadyProcessed)
    );
    assert_eq!(w.repository.get(&placed.id).unwrap(), done);
}

#[tokio::test]
async fn forgotten_actor_is_not_found() {
    let w = world();
    w.identity.sign_in("U9");

    let err = w.identity.current_actor().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn cache_outage_during_start_is_not_visible_afterwards() {
    let w = world();
    let u1 = w.as_actor("U1").await;
    let u2 = w.as_actor("U2").await;
    let placed = w
        .coordinator
        .place_order(NewOrder::new("Ship widget", None), &u1)
        .await
        .unwrap();

    w.cache.fail(true);
    let started = w.coordinator.start_processing(&placed.id, &u2).await.unwrap();
    w.cache.fail(false);

    assert_eq!(w.coordinator.get_by_id(&placed.id, &u2).await.unwrap(), started);
    assert_eq!(w.coordinator.get_by_id(&placed.id, &u1).await.unwrap(), started);
}
