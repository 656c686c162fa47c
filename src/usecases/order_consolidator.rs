//! Order Consolidator - Consumer Orders and Demand
//!
//! Consumer side of a cycle: find-or-create of the (cycle, consumer) order
//! and its lines, demand totals per product and the finalized check used by
//! the order form.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::domain::ids::{ConsumerId, ConsumerOrderId, CycleId, ProductId};
use crate::domain::offer::aggregate_offers;
use crate::domain::order::{consolidate_demand, ConsumerOrder, ConsumerOrderItem, DemandLine, OrderState};
use crate::error::{EngineError, Result};
use crate::ports::repository::{
  CycleRepository, OfferRepository, OrderRepository, ProductRepository, RepoError,
};

use super::offer_aggregator::checked_quantity;

/// Consumer order workflows over the cycle, order, offer and product ports.
pub struct OrderConsolidator<R>
where
  R: CycleRepository + OrderRepository + OfferRepository + ProductRepository,
{
  repo: Arc<R>,
}

impl<R> OrderConsolidator<R>
where
  R: CycleRepository + OrderRepository + OfferRepository + ProductRepository,
{
  /// Create a new consolidator.
  pub const fn new(repo: Arc<R>) -> Self {
    Self { repo }
  }

  /// Return the consumer's order for the cycle, creating an open one on
  /// first use. The cycle must exist.
  #[instrument(skip(self), fields(cycle = %cycle_id, consumer = %consumer_id))]
  pub async fn upsert_consumer_order(
    &self,
    cycle_id: CycleId,
    consumer_id: ConsumerId,
  ) -> Result<ConsumerOrder> {
    if self.repo.load_cycle(cycle_id).await?.is_none() {
      return Err(EngineError::not_found("cycle", cycle_id));
    }

    if let Some(order) = self.repo.find_consumer_order(cycle_id, consumer_id).await? {
      return Ok(order);
    }

    let order = ConsumerOrder::new(cycle_id, consumer_id);
    match self.repo.insert_consumer_order(&order).await {
      Ok(()) => {
        info!(order_id = %order.id, "Consumer order created");
        Ok(order)
      }
      Err(RepoError::Conflict { .. }) => {
        debug!("Concurrent order insert, re-reading");
        self
          .repo
          .find_consumer_order(cycle_id, consumer_id)
          .await?
          .ok_or_else(|| EngineError::not_found("consumer order", format!("{cycle_id}/{consumer_id}")))
      }
      Err(e) => Err(e.into()),
    }
  }

  /// Set the requested quantity of a product (last write wins).
  #[instrument(skip(self), fields(order = %order_id, product = %product_id))]
  pub async fn upsert_order_item(
    &self,
    order_id: ConsumerOrderId,
    product_id: ProductId,
    quantity: i64,
  ) -> Result<ConsumerOrderItem> {
    let quantity = checked_quantity(quantity)?;

    if let Some(item) = self.repo.find_order_item(order_id, product_id).await? {
      return self.overwrite_quantity(item, quantity).await;
    }

    if self.repo.get_product(product_id).await?.is_none() {
      return Err(EngineError::not_found("product", product_id));
    }
    if self.repo.get_consumer_order(order_id).await?.is_none() {
      return Err(EngineError::not_found("consumer order", order_id));
    }

    let item = ConsumerOrderItem::new(order_id, product_id, quantity);
    match self.repo.insert_order_item(&item).await {
      Ok(()) => Ok(item),
      Err(RepoError::Conflict { .. }) => {
        debug!("Concurrent order item insert, re-reading");
        let existing = self
          .repo
          .find_order_item(order_id, product_id)
          .await?
          .ok_or_else(|| EngineError::not_found("order item", format!("{order_id}/{product_id}")))?;
        self.overwrite_quantity(existing, quantity).await
      }
      Err(e) => Err(e.into()),
    }
  }

  async fn overwrite_quantity(
    &self,
    mut item: ConsumerOrderItem,
    quantity: u32,
  ) -> Result<ConsumerOrderItem> {
    if item.quantity != quantity {
      self.repo.set_order_item_quantity(item.id, quantity).await?;
      item.quantity = quantity;
    }
    Ok(item)
  }

  /// Lines of a consumer order, zero quantities included.
  pub async fn order_items(&self, order_id: ConsumerOrderId) -> Result<Vec<ConsumerOrderItem>> {
    Ok(self.repo.list_order_items(order_id).await?)
  }

  /// Remove zero-quantity lines of an order.
  pub async fn prune_empty_order_items(&self, order_id: ConsumerOrderId) -> Result<usize> {
    let removed = self.repo.delete_empty_order_items(order_id).await?;
    info!(order_id = %order_id, removed, "Empty order items pruned");
    Ok(removed)
  }

  /// Total ordered quantity of a product across the cycle; 0 when nobody
  /// ordered it.
  #[instrument(skip(self), fields(cycle = %cycle_id, product = %product_id))]
  pub async fn sum_ordered_quantity(&self, cycle_id: CycleId, product_id: ProductId) -> Result<u64> {
    let items = self.repo.list_cycle_order_items(cycle_id).await?;
    Ok(
      items
        .iter()
        .filter(|item| item.product_id == product_id)
        .map(|item| u64::from(item.quantity))
        .sum(),
    )
  }

  /// Whether the consumer's order in the cycle is finalized.
  ///
  /// False both for an open order and for no order at all; use
  /// [`Self::order_state`] to tell those apart.
  pub async fn is_finalized(&self, cycle_id: CycleId, consumer_id: ConsumerId) -> Result<bool> {
    Ok(self.order_state(cycle_id, consumer_id).await? == OrderState::Finalized)
  }

  /// Where the consumer stands in the cycle.
  #[instrument(skip(self), fields(cycle = %cycle_id, consumer = %consumer_id))]
  pub async fn order_state(&self, cycle_id: CycleId, consumer_id: ConsumerId) -> Result<OrderState> {
    let order = self.repo.find_consumer_order(cycle_id, consumer_id).await?;
    Ok(OrderState::from(order.as_ref()))
  }

  /// Ordered vs offered quantity per product for the cycle.
  #[instrument(skip(self), fields(cycle = %cycle_id))]
  pub async fn consolidate_demand(&self, cycle_id: CycleId) -> Result<Vec<DemandLine>> {
    let items = self.repo.list_cycle_order_items(cycle_id).await?;
    let availability = aggregate_offers(&self.repo.list_offer_lines(cycle_id).await?);
    let demand = consolidate_demand(&items, &availability);

    let short = demand.iter().filter(|line| line.shortfall > 0).count();
    debug!(products = demand.len(), short, "Demand consolidated");
    Ok(demand)
  }
}
