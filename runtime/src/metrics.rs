//! Prometheus metrics for the coordinator and the reclaimer.
//!
//! Recording goes through the `metrics` facade, so nothing is exported until
//! a recorder is installed. The worker binary installs the Prometheus
//! exporter with [`install_exporter`]; library users may install any other
//! recorder.
//!
//! # Example
//!
//! ```rust,no_run
//! use orderflow_runtime::metrics::install_exporter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Metrics available at http://localhost:9090/metrics
//! install_exporter("0.0.0.0:9090".parse()?)?;
//! # Ok(())
//! # }
//! ```

use crate::reclaimer::ReclaimReport;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use orderflow_core::{ErrorKind, Transition};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Orders successfully placed.
pub const ORDERS_PLACED: &str = "orderflow.orders.placed";
/// Successful transitions, labelled by `transition`.
pub const ORDER_TRANSITIONS: &str = "orderflow.orders.transitions";
/// Rejected operations, labelled by error `kind`.
pub const ORDERS_REJECTED: &str = "orderflow.orders.rejected";
/// Start attempts turned away because the processing lock was held.
pub const LOCK_CONTENDED: &str = "orderflow.lock.contended";
/// Orders reverted to ready by the reclaimer.
pub const RECLAIMER_RECLAIMED: &str = "orderflow.reclaimer.reclaimed";
/// Reclaim writes that failed.
pub const RECLAIMER_FAILED: &str = "orderflow.reclaimer.failed";
/// Wall time of one reclaim cycle.
pub const RECLAIMER_CYCLE_DURATION: &str = "orderflow.reclaimer.cycle_duration_seconds";

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`MetricsError`] if the exporter cannot be built or a recorder is
/// already installed.
pub fn install_exporter(addr: SocketAddr) -> Result<(), MetricsError> {
    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        )
        .map_err(|e| MetricsError::Build(e.to_string()))?;

    builder
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    describe_metrics();
    tracing::info!(%addr, "Metrics exporter listening on http://{addr}/metrics");
    Ok(())
}

/// Register descriptions for every metric with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(ORDERS_PLACED, "Total number of orders placed");
    describe_counter!(
        ORDER_TRANSITIONS,
        "Total number of successful order status transitions"
    );
    describe_counter!(
        ORDERS_REJECTED,
        "Total number of rejected coordinator operations"
    );
    describe_counter!(
        LOCK_CONTENDED,
        "Total number of start attempts refused because the processing lock was held"
    );
    describe_counter!(
        RECLAIMER_RECLAIMED,
        "Total number of stale orders reverted to ready"
    );
    describe_counter!(
        RECLAIMER_FAILED,
        "Total number of reclaim writes that failed"
    );
    describe_histogram!(
        RECLAIMER_CYCLE_DURATION,
        "Time taken by one reclaim cycle"
    );
}

/// Coordinator metrics recorder.
pub struct CoordinatorMetrics;

impl CoordinatorMetrics {
    /// Record a placed order.
    pub fn record_placed() {
        counter!(ORDERS_PLACED).increment(1);
    }

    /// Record a successful transition.
    pub fn record_transition(transition: Transition) {
        counter!(ORDER_TRANSITIONS, "transition" => transition.as_str()).increment(1);
    }

    /// Record a rejected operation.
    pub fn record_rejection(kind: ErrorKind) {
        counter!(ORDERS_REJECTED, "kind" => kind.as_str()).increment(1);
    }

    /// Record a start refused on a held lock.
    pub fn record_contention() {
        counter!(LOCK_CONTENDED).increment(1);
    }
}

/// Reclaimer metrics recorder.
pub struct ReclaimerMetrics;

impl ReclaimerMetrics {
    /// Record the outcome of one cycle.
    pub fn record_cycle(report: &ReclaimReport, duration: Duration) {
        counter!(RECLAIMER_RECLAIMED).increment(report.reclaimed as u64);
        counter!(RECLAIMER_FAILED).increment(report.failed as u64);
        histogram!(RECLAIMER_CYCLE_DURATION).record(duration.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_rendered_under_local_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe_metrics();
            CoordinatorMetrics::record_placed();
            CoordinatorMetrics::record_transition(Transition::Start);
            CoordinatorMetrics::record_rejection(ErrorKind::Conflict);
            ReclaimerMetrics::record_cycle(
                &ReclaimReport {
                    scanned: 3,
                    reclaimed: 2,
                    skipped: 0,
                    failed: 1,
                },
                Duration::from_millis(20),
            );
        });

        let rendered = handle.render();
        assert!(rendered.contains("orderflow_orders_placed"));
        assert!(rendered.contains("transition=\"start\""));
        assert!(rendered.contains("kind=\"conflict\""));
        assert!(rendered.contains("orderflow_reclaimer_reclaimed"));
        assert!(rendered.contains("orderflow_reclaimer_cycle_duration_seconds"));
    }
}
