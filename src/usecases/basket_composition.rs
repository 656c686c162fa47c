//! Basket Composition Engine - Compositions per Cycle
//!
//! Turns an administrator's basket request list into Composition rows and
//! plans how offered supply covers each basket's product list.
//!
//! Rules:
//! - one Composition per (cycle, basket)
//! - both reserved system baskets always get a quantity-1 Composition
//! - a bad entry (negative quantity, unknown basket) is skipped and reported;
//!   the rest of the batch still runs

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::domain::allocation::{plan_allocation, AllocationPlan};
use crate::domain::basket::{Composition, SystemBasket};
use crate::domain::error::DomainError;
use crate::domain::ids::{BasketId, CycleId};
use crate::domain::offer::aggregate_offers;
use crate::error::{EngineError, Result};
use crate::ports::repository::{
  BasketRepository, CompositionRepository, CycleRepository, OfferRepository, RepoError,
};

use super::batch::{BatchReport, ItemOutcome, ItemStatus};
use super::bootstrap::ensure_system_baskets;

/// One entry of an administrator's basket list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketRequest {
  /// Basket template to compose.
  pub basket_id: BasketId,
  /// Number of baskets; negative entries are rejected.
  pub quantity: i64,
}

/// Creates and updates the basket compositions of cycles.
pub struct BasketCompositionEngine<R>
where
  R: CycleRepository + BasketRepository + CompositionRepository + OfferRepository,
{
  repo: Arc<R>,
}

impl<R> BasketCompositionEngine<R>
where
  R: CycleRepository + BasketRepository + CompositionRepository + OfferRepository,
{
  /// Create a new composition engine.
  pub const fn new(repo: Arc<R>) -> Self {
    Self { repo }
  }

  /// Create the compositions of a cycle.
  ///
  /// Entries naming a reserved basket are rejected: those are always
  /// provisioned with quantity 1 after the caller's entries, seeding the
  /// reserved basket rows first when they are missing.
  #[instrument(skip(self, requested), fields(cycle = %cycle_id, entries = requested.len()))]
  pub async fn compose_for_cycle(
    &self,
    cycle_id: CycleId,
    requested: &[BasketRequest],
  ) -> Result<BatchReport<BasketId>> {
    self.require_cycle(cycle_id).await?;
    ensure_system_baskets(self.repo.as_ref()).await?;

    let mut outcomes = Vec::with_capacity(requested.len() + SystemBasket::ALL.len());

    for request in requested {
      let status = if SystemBasket::from_id(request.basket_id).is_some() {
        ItemStatus::Rejected("reserved basket is provisioned automatically".to_string())
      } else {
        match validate_quantity(request) {
          Ok(quantity) => self.create(cycle_id, request.basket_id, quantity).await,
          Err(reason) => ItemStatus::Rejected(reason),
        }
      };
      outcomes.push(log_outcome(request.basket_id, status));
    }

    for system in SystemBasket::ALL {
      let status = match self.repo.find_composition(cycle_id, system.id()).await {
        Ok(Some(_)) => ItemStatus::Unchanged,
        Ok(None) => self.create(cycle_id, system.id(), 1).await,
        Err(e) => storage_failed(&e),
      };
      outcomes.push(log_outcome(system.id(), status));
    }

    let report = BatchReport::from_outcomes(outcomes);
    info!(
      succeeded = report.succeeded,
      rejected = report.rejected,
      failed = report.failed,
      "Cycle composition created"
    );
    Ok(report)
  }

  /// Apply a new basket list to an existing cycle.
  ///
  /// Existing compositions get the new quantity; missing ones are created.
  #[instrument(skip(self, requested), fields(cycle = %cycle_id, entries = requested.len()))]
  pub async fn update_for_cycle(
    &self,
    cycle_id: CycleId,
    requested: &[BasketRequest],
  ) -> Result<BatchReport<BasketId>> {
    self.require_cycle(cycle_id).await?;

    let mut outcomes = Vec::with_capacity(requested.len());
    for request in requested {
      let status = match validate_quantity(request) {
        Ok(quantity) => self.upsert(cycle_id, request.basket_id, quantity).await,
        Err(reason) => ItemStatus::Rejected(reason),
      };
      outcomes.push(log_outcome(request.basket_id, status));
    }

    let report = BatchReport::from_outcomes(outcomes);
    info!(
      succeeded = report.succeeded,
      rejected = report.rejected,
      failed = report.failed,
      "Cycle composition updated"
    );
    Ok(report)
  }

  /// Assign the cycle's offered supply to its compositions, in order.
  #[instrument(skip(self), fields(cycle = %cycle_id))]
  pub async fn plan_allocation(&self, cycle_id: CycleId) -> Result<AllocationPlan> {
    self.require_cycle(cycle_id).await?;

    let compositions = self.repo.list_compositions(cycle_id).await?;
    let mut with_baskets = Vec::with_capacity(compositions.len());
    for composition in compositions {
      let basket = self
        .repo
        .get_basket(composition.basket_id)
        .await?
        .ok_or_else(|| EngineError::not_found("basket", composition.basket_id))?;
      with_baskets.push((composition, basket));
    }

    let availability = aggregate_offers(&self.repo.list_offer_lines(cycle_id).await?);
    let plan = plan_allocation(&with_baskets, &availability);

    info!(
      compositions = plan.compositions.len(),
      fully_covered = plan.is_fully_covered(),
      "Allocation planned"
    );
    Ok(plan)
  }

  async fn require_cycle(&self, cycle_id: CycleId) -> Result<()> {
    if self.repo.load_cycle(cycle_id).await?.is_none() {
      return Err(EngineError::not_found("cycle", cycle_id));
    }
    Ok(())
  }

  async fn create(&self, cycle_id: CycleId, basket_id: BasketId, quantity: u32) -> ItemStatus {
    match self.repo.get_basket(basket_id).await {
      Ok(Some(_)) => {}
      Ok(None) => return ItemStatus::Rejected(format!("basket {basket_id} not found")),
      Err(e) => return storage_failed(&e),
    }

    match self
      .repo
      .insert_composition(&Composition::new(cycle_id, basket_id, quantity))
      .await
    {
      Ok(()) => ItemStatus::Created,
      Err(RepoError::Conflict { .. }) => {
        ItemStatus::Rejected("composition already exists for this cycle".to_string())
      }
      Err(e) => storage_failed(&e),
    }
  }

  async fn upsert(&self, cycle_id: CycleId, basket_id: BasketId, quantity: u32) -> ItemStatus {
    match self.repo.find_composition(cycle_id, basket_id).await {
      Ok(Some(existing)) if existing.quantity == quantity => ItemStatus::Unchanged,
      Ok(Some(existing)) => match self
        .repo
        .set_composition_quantity(existing.id, quantity)
        .await
      {
        Ok(()) => ItemStatus::Updated,
        Err(e) => storage_failed(&e),
      },
      Ok(None) => self.create(cycle_id, basket_id, quantity).await,
      Err(e) => storage_failed(&e),
    }
  }
}

fn validate_quantity(request: &BasketRequest) -> std::result::Result<u32, String> {
  if request.quantity < 0 {
    return Err(
      DomainError::NegativeQuantity {
        quantity: request.quantity,
      }
      .to_string(),
    );
  }
  u32::try_from(request.quantity).map_err(|_| format!("quantity {} out of range", request.quantity))
}

fn storage_failed(e: &RepoError) -> ItemStatus {
  error!(error = %e, "Storage failure on composition item");
  ItemStatus::Failed(e.to_string())
}

fn log_outcome(basket_id: BasketId, status: ItemStatus) -> ItemOutcome<BasketId> {
  if let ItemStatus::Rejected(reason) = &status {
    warn!(basket_id = %basket_id, reason = %reason, "Composition entry rejected");
  }
  ItemOutcome {
    key: basket_id,
    status,
  }
}
