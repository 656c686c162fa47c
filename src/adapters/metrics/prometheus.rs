//! Prometheus Metrics Registry - Workflow Observability
//!
//! Registers and exposes Prometheus metrics for dashboards: market
//! composition progress per cycle and store size.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use crate::adapters::persistence::StoreStats;
use crate::domain::cycle::Cycle;
use crate::domain::lifecycle::CycleLifecycle;

/// Centralized Prometheus metrics for the engine.
///
/// All metrics follow the naming convention `cycle_engine_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Markets per cycle and composition status.
    pub markets_by_status: IntGaugeVec,
    /// Row counts per store table.
    pub store_rows: IntGaugeVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let markets_by_status = IntGaugeVec::new(
            Opts::new(
                "cycle_engine_markets",
                "Markets per cycle by composition status",
            ),
            &["cycle", "status"],
        )?;

        let store_rows = IntGaugeVec::new(
            Opts::new("cycle_engine_store_rows", "Rows held per store table"),
            &["table"],
        )?;

        registry.register(Box::new(markets_by_status.clone()))?;
        registry.register(Box::new(store_rows.clone()))?;

        Ok(Self {
            registry,
            markets_by_status,
            store_rows,
        })
    }

    /// Refresh the per-cycle market gauges from cycle snapshots.
    pub fn observe_cycles(&self, cycles: &[Cycle]) {
        self.markets_by_status.reset();
        for cycle in cycles {
            let id = cycle.id.to_string();
            let counts = CycleLifecycle::market_status_counts(cycle);
            for (status, count) in [
                ("pendente", counts.pendente),
                ("em_andamento", counts.em_andamento),
                ("concluida", counts.concluida),
            ] {
                self.markets_by_status
                    .with_label_values(&[id.as_str(), status])
                    .set(i64::try_from(count).unwrap_or(i64::MAX));
            }
        }
    }

    /// Refresh the store size gauges.
    pub fn observe_store(&self, stats: StoreStats) {
        for (table, rows) in [
            ("cycles", stats.cycles),
            ("markets", stats.markets),
            ("offers", stats.offers),
            ("orders", stats.orders),
        ] {
            self.store_rows
                .with_label_values(&[table])
                .set(i64::try_from(rows).unwrap_or(i64::MAX));
        }
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move {
                    metrics.render().map_err(|e| {
                        error!(error = %e, "Failed to encode metrics");
                        StatusCode::INTERNAL_SERVER_ERROR
                    })
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}
