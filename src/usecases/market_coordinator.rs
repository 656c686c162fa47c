//! Market Coordinator - Cycle Administration and Market Workflow
//!
//! Wraps the pure gating and lifecycle rules around the cycle port:
//! - cycle create/update/delete and stage transitions
//! - gating queries (blocked, current, next pending, direct-sale release)
//! - market workflow actions (start composition, conclude)
//!
//! Every gating decision is computed from one `load_cycle` snapshot. Against
//! a non-transactional store a concurrent market update can still make the
//! decision stale.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::domain::cycle::{Cycle, CycleStatus, DeliveryWindow, TimeWindow};
use crate::domain::error::DomainError;
use crate::domain::gate::{MarketGate, ReleaseDecision};
use crate::domain::ids::{CycleId, MarketId};
use crate::domain::lifecycle::{CycleLifecycle, MarketStatusCounts, OrderWindow, Transition};
use crate::domain::market::{CompositionStatus, Market, SaleType};
use crate::error::{EngineError, Result};
use crate::ports::repository::{CycleRepository, RepoError};

/// Cycle and market workflows over the cycle port.
pub struct MarketCoordinator<R: CycleRepository> {
  repo: Arc<R>,
}

impl<R: CycleRepository> MarketCoordinator<R> {
  /// Create a new coordinator.
  pub const fn new(repo: Arc<R>) -> Self {
    Self { repo }
  }

  // ---- Cycle administration ----

  /// Validate and store a new cycle with its markets.
  #[instrument(skip(self, cycle), fields(cycle = %cycle.id, markets = cycle.markets.len()))]
  pub async fn create_cycle(&self, mut cycle: Cycle) -> Result<Cycle> {
    cycle.validate()?;
    cycle.sort_markets();

    match self.repo.insert_cycle(&cycle).await {
      Ok(()) => {
        info!(name = %cycle.name, "Cycle created");
        Ok(cycle)
      }
      Err(RepoError::Conflict { key, .. }) => Err(EngineError::ValidationRejected(format!(
        "cycle {key} already exists"
      ))),
      Err(e) => Err(e.into()),
    }
  }

  /// Append a market to an existing cycle.
  #[instrument(skip(self), fields(cycle = %cycle_id))]
  pub async fn add_market(&self, cycle_id: CycleId, sale_type: SaleType, ordem: i32) -> Result<Market> {
    let mut cycle = self.load_cycle(cycle_id).await?;
    let market = Market::new(cycle_id, sale_type, ordem);
    cycle.markets.push(market.clone());
    cycle.validate()?;

    match self.repo.insert_market(&market).await {
      Ok(()) => {
        info!(market_id = %market.id, ordem, sale_type = %sale_type, "Market added");
        Ok(market)
      }
      Err(RepoError::Conflict { .. }) => Err(DomainError::DuplicateOrdem { ordem }.into()),
      Err(e) => Err(e.into()),
    }
  }

  /// Save the cycle header and replace its delivery windows.
  ///
  /// Windows are deleted and recreated, never diffed. The stage cannot be
  /// changed here; a status different from the stored one is rejected, use
  /// [`Self::transition_cycle`].
  #[instrument(skip(self, cycle, delivery_windows), fields(cycle = %cycle.id, windows = delivery_windows.len()))]
  pub async fn update_cycle(
    &self,
    cycle: &Cycle,
    delivery_windows: &[TimeWindow],
  ) -> Result<Vec<DeliveryWindow>> {
    let stored = self.load_cycle(cycle.id).await?;
    if cycle.status != stored.status {
      warn!(
        stored = ?stored.status,
        requested = ?cycle.status,
        "Cycle stage change outside transition"
      );
      return Err(EngineError::ValidationRejected(format!(
        "cycle {} stage changes go through transition_cycle",
        cycle.id
      )));
    }

    // Markets are managed separately; validate the header against the stored set.
    let mut candidate = cycle.clone();
    candidate.markets = stored.markets;
    candidate.validate()?;
    for window in delivery_windows {
      if window.end < window.start {
        return Err(DomainError::InvertedWindow { window: "entrega" }.into());
      }
    }

    self.repo.update_cycle(&candidate).await?;

    let windows: Vec<DeliveryWindow> = delivery_windows
      .iter()
      .map(|w| DeliveryWindow::new(cycle.id, *w))
      .collect();
    self.repo.replace_delivery_windows(cycle.id, &windows).await?;

    info!("Cycle updated");
    Ok(windows)
  }

  /// Delivery windows of a cycle ordered by start.
  pub async fn delivery_windows(&self, cycle_id: CycleId) -> Result<Vec<DeliveryWindow>> {
    Ok(self.repo.list_delivery_windows(cycle_id).await?)
  }

  /// Move a cycle to another stage.
  #[instrument(skip(self), fields(cycle = %cycle_id))]
  pub async fn transition_cycle(&self, cycle_id: CycleId, to: CycleStatus) -> Result<Transition> {
    let cycle = self.load_cycle(cycle_id).await?;
    let transition = CycleLifecycle::validate_transition(cycle.status, to)?;

    if let Transition::Advance(status) = transition {
      self.repo.set_cycle_status(cycle_id, status).await?;
      info!(from = ?cycle.status, "Cycle stage changed");
    } else {
      debug!("Cycle already at requested stage");
    }
    Ok(transition)
  }

  /// Delete a cycle that nothing references any more.
  #[instrument(skip(self), fields(cycle = %cycle_id))]
  pub async fn delete_cycle(&self, cycle_id: CycleId) -> Result<()> {
    let dependents = self.repo.dependents(cycle_id).await?;
    if !dependents.is_empty() {
      warn!(?dependents, "Cycle delete rejected");
      return Err(EngineError::ValidationRejected(format!(
        "cycle {cycle_id} still has {} markets, {} compositions, {} offers and {} orders",
        dependents.markets, dependents.compositions, dependents.offers, dependents.orders
      )));
    }

    self.repo.delete_cycle(cycle_id).await?;
    info!("Cycle deleted");
    Ok(())
  }

  /// Load a cycle snapshot with its markets.
  pub async fn load_cycle(&self, cycle_id: CycleId) -> Result<Cycle> {
    self
      .repo
      .load_cycle(cycle_id)
      .await?
      .ok_or_else(|| EngineError::not_found("cycle", cycle_id))
  }

  /// All cycles, newest first.
  pub async fn list_cycles(&self) -> Result<Vec<Cycle>> {
    Ok(self.repo.list_cycles().await?)
  }

  // ---- Gating queries ----

  /// Whether a market must wait for its predecessor.
  pub async fn is_blocked(&self, cycle_id: CycleId, market_id: MarketId) -> Result<bool> {
    let cycle = self.load_cycle(cycle_id).await?;
    let market = find_market(&cycle, market_id)?;
    Ok(MarketGate::is_blocked(&cycle, market))
  }

  /// The market an administrator should be looking at.
  pub async fn current_market(
    &self,
    cycle_id: CycleId,
    preferred: Option<MarketId>,
  ) -> Result<Option<Market>> {
    let cycle = self.load_cycle(cycle_id).await?;
    Ok(MarketGate::current_market(&cycle, preferred).cloned())
  }

  /// First unblocked market still open for composition.
  pub async fn next_pending_market(&self, cycle_id: CycleId) -> Result<Option<Market>> {
    let cycle = self.load_cycle(cycle_id).await?;
    Ok(MarketGate::next_pending_market(&cycle).cloned())
  }

  /// Whether a direct-sale market may be shown to consumers.
  pub async fn release_direct_sale(
    &self,
    cycle_id: CycleId,
    market_id: MarketId,
  ) -> Result<ReleaseDecision> {
    let cycle = self.load_cycle(cycle_id).await?;
    let market = find_market(&cycle, market_id)?;
    Ok(MarketGate::release_direct_sale(&cycle, market))
  }

  /// Whether consumers may place orders in the cycle at `now`.
  pub async fn is_open_for_orders(&self, cycle_id: CycleId, now: DateTime<Utc>) -> Result<OrderWindow> {
    let cycle = self.load_cycle(cycle_id).await?;
    Ok(CycleLifecycle::is_open_for_orders(&cycle, now))
  }

  /// Per-status market counts of a cycle.
  pub async fn status_counts(&self, cycle_id: CycleId) -> Result<MarketStatusCounts> {
    let cycle = self.load_cycle(cycle_id).await?;
    Ok(CycleLifecycle::market_status_counts(&cycle))
  }

  /// True once every market of the cycle is concluded.
  pub async fn all_markets_concluded(&self, cycle_id: CycleId) -> Result<bool> {
    let cycle = self.load_cycle(cycle_id).await?;
    Ok(CycleLifecycle::all_markets_concluded(&cycle))
  }

  // ---- Market workflow ----

  /// Begin composing a market.
  ///
  /// Rejected while the market is gated; a market already in progress is
  /// returned as is.
  #[instrument(skip(self), fields(cycle = %cycle_id, market = %market_id))]
  pub async fn start_composition(&self, cycle_id: CycleId, market_id: MarketId) -> Result<Market> {
    let cycle = self.load_cycle(cycle_id).await?;
    let market = find_market(&cycle, market_id)?;

    match market.status {
      CompositionStatus::EmAndamento => return Ok(market.clone()),
      CompositionStatus::Concluida => {
        return Err(EngineError::ValidationRejected(format!(
          "market {market_id} is already concluded"
        )));
      }
      CompositionStatus::Pendente => {}
    }

    if MarketGate::is_blocked(&cycle, market) {
      warn!(ordem = market.ordem, "Composition start rejected, market blocked");
      return Err(DomainError::MarketBlocked { market_id }.into());
    }

    self
      .repo
      .set_market_status(market_id, CompositionStatus::EmAndamento)
      .await?;
    info!(ordem = market.ordem, "Market composition started");

    Ok(Market {
      status: CompositionStatus::EmAndamento,
      ..market.clone()
    })
  }

  /// Mark a market's composition as done. Idempotent.
  ///
  /// Gated like [`Self::start_composition`]: a market whose predecessor is
  /// not concluded cannot be concluded either.
  #[instrument(skip(self), fields(cycle = %cycle_id, market = %market_id))]
  pub async fn conclude_market(&self, cycle_id: CycleId, market_id: MarketId) -> Result<Market> {
    let cycle = self.load_cycle(cycle_id).await?;
    let market = find_market(&cycle, market_id)?;

    if !market.is_concluded() {
      if MarketGate::is_blocked(&cycle, market) {
        warn!(ordem = market.ordem, "Conclusion rejected, market blocked");
        return Err(DomainError::MarketBlocked { market_id }.into());
      }
      self
        .repo
        .set_market_status(market_id, CompositionStatus::Concluida)
        .await?;
      info!(ordem = market.ordem, "Market concluded");
    }

    Ok(Market {
      status: CompositionStatus::Concluida,
      ..market.clone()
    })
  }
}

fn find_market(cycle: &Cycle, market_id: MarketId) -> Result<&Market> {
  cycle
    .market(market_id)
    .ok_or_else(|| EngineError::not_found("market", market_id))
}
