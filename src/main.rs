//! Cycle Market Engine - Entry Point
//!
//! Wires configuration, logging, the store and the observability servers,
//! then keeps snapshots and gauges fresh until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (or `CONFIG_PATH`) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Restore the memory store from the last snapshot
//! 4. Seed the reserved system baskets
//! 5. Spawn health server (/live + /ready) and Prometheus /metrics
//! 6. Periodic snapshot + gauge refresh loop
//! 7. On SIGINT: stop accepting, write a final snapshot, exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use cycle_market_engine::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use cycle_market_engine::adapters::persistence::{MemoryStore, StateStore};
use cycle_market_engine::config::{self, AppConfig};
use cycle_market_engine::usecases::{ensure_system_baskets, MarketCoordinator};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = config::loader::config_path();
    let config = config::loader::load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.engine.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.engine.name,
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.persistence.data_dir,
        "Starting cycle market engine"
    );

    // ── 3. Restore store from snapshot ──────────────────────
    let state_store = StateStore::new(&config.persistence.data_dir)
        .await
        .context("Failed to open state store")?;
    let store = Arc::new(match state_store.load().await? {
        Some(state) => MemoryStore::from_state(state),
        None => MemoryStore::new(),
    });

    // ── 4. Reserved baskets ─────────────────────────────────
    let created = ensure_system_baskets(store.as_ref())
        .await
        .context("Failed to provision system baskets")?;
    info!(created, "System baskets ready");

    // ── 5. Health + metrics servers ─────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let health = Arc::new(HealthState::new());
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);

    let health_server = HealthServer::new(
        Arc::clone(&health),
        format!("0.0.0.0:{}", config.metrics.health_port),
    );
    let health_handle = tokio::spawn(health_server.run(shutdown_tx.subscribe()));

    let metrics_handle = if config.metrics.enabled {
        let serve = Arc::clone(&metrics).serve(
            config.metrics.bind_address.clone(),
            shutdown_tx.subscribe(),
        );
        Some(tokio::spawn(serve))
    } else {
        info!("Metrics export disabled");
        None
    };

    // ── 6. Snapshot loop until SIGINT ───────────────────────
    run_snapshot_loop(&config, &store, &state_store, &health, &metrics).await;

    // ── 7. Graceful shutdown (stop→save→exit) ───────────────
    health.accepting.store(false, Ordering::Relaxed);
    let _ = shutdown_tx.send(());

    match state_store.save(&store.snapshot().await).await {
        Ok(()) => info!("Final snapshot written"),
        Err(e) => error!(error = %e, "Final snapshot failed"),
    }

    let _ = tokio::time::timeout(Duration::from_secs(5), health_handle).await;
    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Write snapshots and refresh gauges on a fixed interval until ctrl-c.
async fn run_snapshot_loop(
    config: &AppConfig,
    store: &Arc<MemoryStore>,
    state_store: &StateStore,
    health: &HealthState,
    metrics: &MetricsRegistry,
) {
    let coordinator = MarketCoordinator::new(Arc::clone(store));
    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.persistence.snapshot_interval_seconds));
    // First tick fires immediately; the restored state is already on disk.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = signal::ctrl_c() => {
                info!("SIGINT received, initiating graceful shutdown");
                break;
            }
            _ = ticker.tick() => {
                match state_store.save(&store.snapshot().await).await {
                    Ok(()) => health.store_healthy.store(true, Ordering::Relaxed),
                    Err(e) => {
                        health.store_healthy.store(false, Ordering::Relaxed);
                        error!(error = %e, "Snapshot failed");
                    }
                }

                match coordinator.list_cycles().await {
                    Ok(cycles) => metrics.observe_cycles(&cycles),
                    Err(e) => warn!(error = %e, "Cycle gauges not refreshed"),
                }
                metrics.observe_store(store.stats().await);
            }
        }
    }
}
