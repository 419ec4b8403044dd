//! Orderflow background worker.
//!
//! Connects to the order store (and the Redis order cache when enabled),
//! then runs the stale order reclaimer until SIGINT or SIGTERM.

use anyhow::Context;
use orderflow_core::environment::SystemClock;
use orderflow_postgres::PostgresOrderRepository;
use orderflow_redis::RedisOrderCache;
use orderflow_runtime::{Config, StaleOrderReclaimer, metrics};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real deployments set the environment directly
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.telemetry.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Orderflow worker");

    if let Some(addr) = config.telemetry.metrics_addr {
        metrics::install_exporter(addr).context("installing Prometheus exporter")?;
    }

    info!(
        max_connections = config.database.max_connections,
        "Connecting to order store..."
    );
    let repository = PostgresOrderRepository::with_options(
        &config.database.url,
        config.database.max_connections,
        config.database.connect_timeout,
    )
    .await
    .context("connecting to order store")?;
    repository
        .migrate()
        .await
        .context("running order store migrations")?;
    info!("Order store ready");

    let cache = if config.cache.enabled {
        info!(ttl_secs = config.cache.ttl.as_secs(), "Connecting to order cache...");
        let cache = RedisOrderCache::new(&config.redis.url, config.cache.ttl)
            .await
            .context("connecting to order cache")?;
        Some(cache)
    } else {
        info!("Order cache disabled");
        None
    };

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = StaleOrderReclaimer::new(
        repository,
        cache,
        Arc::new(SystemClock),
        config.reclaimer.clone(),
    )
    .spawn(shutdown_rx);

    shutdown_signal().await;

    info!("Shutting down...");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(config.telemetry.shutdown_timeout, handle).await {
        Ok(Ok(())) => info!("Reclaimer stopped gracefully"),
        Ok(Err(e)) => warn!(error = %e, "Reclaimer task failed"),
        Err(_) => warn!(
            timeout_secs = config.telemetry.shutdown_timeout.as_secs(),
            "Reclaimer shutdown timed out"
        ),
    }

    info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// If a handler cannot be installed the error is logged and that signal is
/// ignored; the other one still stops the worker.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
