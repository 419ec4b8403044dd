//! Stale-work reclaimer.
//!
//! A periodic task that reverts `IN_PROCESS` orders whose processor has gone
//! quiet for longer than the configured threshold. It takes no processing
//! lock: a reclaim is an administrative override. Writes are versioned, so
//! an order that moves between the scan and the write is skipped for the
//! cycle instead of being clobbered.

use crate::config::ReclaimerConfig;
use crate::metrics::ReclaimerMetrics;
use chrono::{DateTime, Utc};
use orderflow_core::environment::Clock;
use orderflow_core::providers::{OrderCache, OrderRepository};
use orderflow_core::{Order, OrderError, OrderStateMachine, OrderStatus, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Outcome of one reclaim cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// In-process orders examined
    pub scanned: usize,
    /// Orders reverted to ready
    pub reclaimed: usize,
    /// Stale orders that changed before they could be reverted
    pub skipped: usize,
    /// Stale orders whose revert failed
    pub failed: usize,
}

/// Reverts stale in-process orders to ready.
pub struct StaleOrderReclaimer<R, C> {
    repository: R,
    cache: C,
    clock: Arc<dyn Clock>,
    config: ReclaimerConfig,
}

impl<R, C> StaleOrderReclaimer<R, C>
where
    R: OrderRepository,
    C: OrderCache,
{
    /// Create a reclaimer over the given store and cache.
    #[must_use]
    pub fn new(repository: R, cache: C, clock: Arc<dyn Clock>, config: ReclaimerConfig) -> Self {
        Self {
            repository,
            cache,
            clock,
            config,
        }
    }

    /// Whether `order` has been in process for longer than the threshold.
    ///
    /// The comparison is strict. An order with no `updated_at` is stale;
    /// one stamped in the future is not.
    #[must_use]
    pub fn is_stale(&self, order: &Order, now: DateTime<Utc>) -> bool {
        order.updated_at.is_none_or(|updated_at| {
            (now - updated_at)
                .to_std()
                .is_ok_and(|elapsed| elapsed > self.config.stale_after)
        })
    }

    /// Run one scan-and-revert cycle.
    ///
    /// Per-order failures are counted in the report and never abort the
    /// cycle.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Storage`] if the initial scan fails.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<ReclaimReport> {
        let started = Instant::now();
        let now = self.clock.now();

        let candidates = self.repository.find_by_status(OrderStatus::InProcess).await?;
        let mut report = ReclaimReport {
            scanned: candidates.len(),
            ..ReclaimReport::default()
        };

        for order in candidates.iter().filter(|order| self.is_stale(order, now)) {
            match self.reclaim(order).await {
                Ok(reclaimed) => {
                    report.reclaimed += 1;
                    info!(
                        order_id = %order.id,
                        processed_by = ?order.processed_by.as_ref().map(ToString::to_string),
                        updated_at = ?order.updated_at,
                        "Reclaimed stale order"
                    );
                    if let Err(e) = self.cache.put(&reclaimed).await {
                        warn!(order_id = %order.id, error = %e, "Failed to cache reclaimed order, evicting");
                        if let Err(e) = self.cache.evict(&order.id).await {
                            warn!(order_id = %order.id, error = %e, "Failed to evict reclaimed order");
                        }
                    }
                },
                Err(OrderError::ConcurrentModification { .. }) => {
                    report.skipped += 1;
                    debug!(order_id = %order.id, "Order changed since scan, skipping");
                },
                Err(e) => {
                    report.failed += 1;
                    error!(order_id = %order.id, error = %e, "Failed to reclaim order");
                },
            }
        }

        ReclaimerMetrics::record_cycle(&report, started.elapsed());
        Ok(report)
    }

    async fn reclaim(&self, order: &Order) -> Result<Order> {
        let next = OrderStateMachine::reclaim(order)?;
        self.repository.save(&next).await
    }
}

impl<R, C> StaleOrderReclaimer<R, C>
where
    R: OrderRepository + 'static,
    C: OrderCache + 'static,
{
    /// Spawn the reclaimer as a background task.
    ///
    /// The first cycle runs immediately, then every `interval`. A cycle that
    /// overruns delays the next tick rather than bursting. The task stops
    /// after the cycle in flight when `shutdown` fires.
    #[must_use]
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            stale_after_secs = self.config.stale_after.as_secs(),
            "Stale order reclaimer started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Stale order reclaimer received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) if report.reclaimed > 0 || report.failed > 0 => {
                            info!(
                                scanned = report.scanned,
                                reclaimed = report.reclaimed,
                                skipped = report.skipped,
                                failed = report.failed,
                                "Reclaim cycle finished"
                            );
                        }
                        Ok(report) => debug!(scanned = report.scanned, "Reclaim cycle found nothing stale"),
                        Err(e) => error!(error = %e, "Reclaim cycle failed"),
                    }
                }
            }
        }

        info!("Stale order reclaimer stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use orderflow_testing::fixtures::{in_process_order, ready_order};
    use orderflow_testing::{InMemoryOrderCache, InMemoryOrderRepository, ManualClock, test_epoch};
    use std::time::Duration;

    fn reclaimer(
        repository: &InMemoryOrderRepository,
        clock: &ManualClock,
    ) -> StaleOrderReclaimer<InMemoryOrderRepository, InMemoryOrderCache> {
        StaleOrderReclaimer::new(
            repository.clone(),
            InMemoryOrderCache::new(),
            Arc::new(clock.clone()),
            ReclaimerConfig::default().with_stale_after(Duration::from_secs(60)),
        )
    }

    #[test]
    fn staleness_is_strict() {
        let clock = ManualClock::new(test_epoch());
        let reclaimer = reclaimer(&InMemoryOrderRepository::new(), &clock);
        let order = in_process_order("U1", "U2", test_epoch());

        assert!(!reclaimer.is_stale(&order, test_epoch() + TimeDelta::seconds(60)));
        assert!(reclaimer.is_stale(&order, test_epoch() + TimeDelta::milliseconds(60_001)));
        assert!(!reclaimer.is_stale(&order, test_epoch() - TimeDelta::seconds(5)));
    }

    #[test]
    fn missing_updated_at_is_stale() {
        let clock = ManualClock::new(test_epoch());
        let reclaimer = reclaimer(&InMemoryOrderRepository::new(), &clock);
        let mut order = in_process_order("U1", "U2", test_epoch());
        order.updated_at = None;

        assert!(reclaimer.is_stale(&order, test_epoch()));
    }

    #[tokio::test]
    async fn fresh_and_non_in_process_orders_are_left_alone() {
        let repository = InMemoryOrderRepository::new();
        let clock = ManualClock::new(test_epoch() + TimeDelta::seconds(30));
        let fresh = repository.seed(in_process_order("U1", "U2", test_epoch())).unwrap();
        let ready = repository.seed(ready_order("U1")).unwrap();

        let report = reclaimer(&repository, &clock).run_once().await.unwrap();

        assert_eq!(
            report,
            ReclaimReport {
                scanned: 1,
                ..ReclaimReport::default()
            }
        );
        assert_eq!(repository.get(&fresh.id).unwrap(), fresh);
        assert_eq!(repository.get(&ready.id).unwrap(), ready);
    }

    #[tokio::test]
    async fn scan_failure_is_reported() {
        let repository = InMemoryOrderRepository::new();
        repository.fail_reads(true);
        let clock = ManualClock::new(test_epoch());

        assert!(reclaimer(&repository, &clock).run_once().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_task_stops_on_shutdown() {
        let repository = InMemoryOrderRepository::new();
        let clock = ManualClock::new(test_epoch());
        let order = repository.seed(in_process_order("U1", "U2", test_epoch())).unwrap();
        clock.advance(TimeDelta::seconds(120));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = StaleOrderReclaimer::new(
            repository.clone(),
            None::<InMemoryOrderCache>,
            Arc::new(clock.clone()),
            ReclaimerConfig::default().with_interval(Duration::from_secs(60)),
        )
        .spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(repository.get(&order.id).unwrap().status, OrderStatus::Ready);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
