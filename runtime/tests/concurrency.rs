//! Races between concurrent callers.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use futures::future::join_all;
use orderflow_core::environment::SystemClock;
use orderflow_core::{Actor, ErrorKind, OrderStatus};
use orderflow_runtime::{
    CoordinatorConfig, ProcessingCoordinator, ReclaimerConfig, StaleOrderReclaimer,
};
use orderflow_testing::fixtures::{in_process_order, ready_order};
use orderflow_testing::{InMemoryOrderCache, InMemoryOrderRepository, InMemoryProcessingLock};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

type Coordinator =
    ProcessingCoordinator<InMemoryOrderRepository, InMemoryProcessingLock, Option<InMemoryOrderCache>>;

fn coordinator(
    repository: &InMemoryOrderRepository,
    lock: &InMemoryProcessingLock,
) -> Arc<Coordinator> {
    Arc::new(ProcessingCoordinator::new(
        repository.clone(),
        lock.clone(),
        None,
        Arc::new(SystemClock),
        CoordinatorConfig::default(),
    ))
}

async fn race_starts(coordinator: &Arc<Coordinator>, order_id: orderflow_core::OrderId, racers: usize) -> (usize, usize) {
    let handles = (0..racers).map(|i| {
        let coordinator = Arc::clone(coordinator);
        tokio::spawn(async move {
            coordinator
                .start_processing(&order_id, &Actor::processor(format!("P{i}")))
                .await
        })
    });

    let results: Vec<_> = join_all(handles).await.into_iter().map(Result::unwrap).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| r.as_ref().is_err_and(|e| e.kind() == ErrorKind::Conflict))
        .count();
    (winners, conflicts)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exactly_one_concurrent_start_wins() {
    let repository = InMemoryOrderRepository::new();
    let lock = InMemoryProcessingLock::new();
    let order = repository.seed(ready_order("U1")).unwrap();
    let coordinator = coordinator(&repository, &lock);

    let (winners, conflicts) = race_starts(&coordinator, order.id, 8).await;

    assert_eq!(winners, 1);
    assert_eq!(conflicts, 7);
    let stored = repository.get(&order.id).unwrap();
    assert_eq!(stored.status, OrderStatus::InProcess);
    assert!(stored.processed_by.is_some());
    assert!(stored.is_consistent());
    assert!(lock.holder(&orderflow_core::providers::processing_lock_key(&order.id)).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn versioned_store_guards_without_lock_service() {
    let repository = InMemoryOrderRepository::new();
    let lock = InMemoryProcessingLock::new();
    lock.fail_probe(true);
    lock.fail_acquire(true);
    let order = repository.seed(ready_order("U1")).unwrap();
    let coordinator = coordinator(&repository, &lock);

    let (winners, conflicts) = race_starts(&coordinator, order.id, 8).await;

    assert_eq!(winners, 1);
    assert_eq!(conflicts, 7);
    // One write for the winner; losers never overwrite it.
    assert_eq!(repository.save_count(), 1);
    assert!(repository.get(&order.id).unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn complete_racing_reclaim_leaves_consistent_order() {
    let repository = InMemoryOrderRepository::new();
    let lock = InMemoryProcessingLock::new();
    let long_ago = chrono::Utc::now() - chrono::TimeDelta::hours(1);
    let order = repository.seed(in_process_order("U1", "U2", long_ago)).unwrap();
    let coordinator = coordinator(&repository, &lock);
    let reclaimer = Arc::new(StaleOrderReclaimer::new(
        repository.clone(),
        None::<InMemoryOrderCache>,
        Arc::new(SystemClock),
        ReclaimerConfig::default().with_stale_after(Duration::from_secs(60)),
    ));

    let complete = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator
                .complete_processing(&order.id, &Actor::processor("U2"))
                .await
        })
    };
    let reclaim = {
        let reclaimer = Arc::clone(&reclaimer);
        tokio::spawn(async move { reclaimer.run_once().await })
    };

    let completed = complete.await.unwrap();
    let report = reclaim.await.unwrap().unwrap();

    let stored = repository.get(&order.id).unwrap();
    assert!(stored.is_consistent());
    match stored.status {
        OrderStatus::Processed => {
            assert!(completed.is_ok());
            assert_eq!(report.reclaimed, 0);
        },
        OrderStatus::Ready => {
            assert_eq!(report.reclaimed, 1);
            assert!(completed.is_err());
        },
        OrderStatus::InProcess => unreachable!("one writer always wins"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn any_number_of_racers_yields_one_winner(racers in 2usize..12) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let (winners, conflicts) = runtime.block_on(async {
            let repository = InMemoryOrderRepository::new();
            let lock = InMemoryProcessingLock::new();
            let order = repository.seed(ready_order("U1")).unwrap();
            race_starts(&coordinator(&repository, &lock), order.id, racers).await
        });

        prop_assert_eq!(winners, 1);
        prop_assert_eq!(conflicts, racers - 1);
    }
}
