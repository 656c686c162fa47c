//! Offer Aggregator - Supplier Offers and Offered Availability
//!
//! Handles the supplier side of a cycle:
//! - find-or-create of the (cycle, supplier) offer and its product lines
//! - per-product availability with the suppliers behind it
//! - product ranking for the offer form
//! - derivation of supplier orders for fulfillment
//!
//! Find-or-create relies on the store's uniqueness constraints: when an
//! insert loses a race (`RepoError::Conflict`) the winning row is re-read.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::domain::error::DomainError;
use crate::domain::ids::{CycleId, OfferId, ProductId, SupplierId};
use crate::domain::offer::{
  aggregate_offers, derive_supplier_orders, Offer, OfferItem, Product, ProductAvailability,
  SupplierOrder,
};
use crate::domain::ranking::{rank_products, DEFAULT_RANKING_WINDOW};
use crate::error::{EngineError, Result};
use crate::ports::repository::{CycleRepository, OfferRepository, ProductRepository, RepoError};

/// Supplier offer workflows over the cycle, offer and product ports.
pub struct OfferAggregator<R: CycleRepository + OfferRepository + ProductRepository> {
  repo: Arc<R>,
  /// Past cycles considered when ranking products.
  ranking_window: usize,
}

impl<R: CycleRepository + OfferRepository + ProductRepository> OfferAggregator<R> {
  /// Create an aggregator with the default ranking window.
  pub const fn new(repo: Arc<R>) -> Self {
    Self {
      repo,
      ranking_window: DEFAULT_RANKING_WINDOW,
    }
  }

  /// Create with a custom ranking window.
  pub const fn with_ranking_window(repo: Arc<R>, ranking_window: usize) -> Self {
    Self {
      repo,
      ranking_window,
    }
  }

  /// Return the supplier's offer for the cycle, creating it on first use.
  ///
  /// The cycle must exist.
  #[instrument(skip(self), fields(cycle = %cycle_id, supplier = %supplier_id))]
  pub async fn find_or_create_offer(
    &self,
    cycle_id: CycleId,
    supplier_id: SupplierId,
  ) -> Result<Offer> {
    if self.repo.load_cycle(cycle_id).await?.is_none() {
      return Err(EngineError::not_found("cycle", cycle_id));
    }

    if let Some(offer) = self.repo.find_offer(cycle_id, supplier_id).await? {
      return Ok(offer);
    }

    let offer = Offer::new(cycle_id, supplier_id);
    match self.repo.insert_offer(&offer).await {
      Ok(()) => {
        info!(offer_id = %offer.id, "Offer created");
        Ok(offer)
      }
      Err(RepoError::Conflict { .. }) => {
        debug!("Concurrent offer insert, re-reading");
        self
          .repo
          .find_offer(cycle_id, supplier_id)
          .await?
          .ok_or_else(|| EngineError::not_found("offer", format!("{cycle_id}/{supplier_id}")))
      }
      Err(e) => Err(e.into()),
    }
  }

  /// Set the offered quantity of a product (last write wins).
  ///
  /// Creates the line on first use with the product's reference price.
  /// A zero quantity is stored as such.
  #[instrument(skip(self), fields(offer = %offer_id, product = %product_id))]
  pub async fn upsert_offer_item(
    &self,
    offer_id: OfferId,
    product_id: ProductId,
    quantity: i64,
  ) -> Result<OfferItem> {
    let quantity = checked_quantity(quantity)?;

    if let Some(item) = self.repo.find_offer_item(offer_id, product_id).await? {
      return self.overwrite_quantity(item, quantity).await;
    }

    let product = self
      .repo
      .get_product(product_id)
      .await?
      .ok_or_else(|| EngineError::not_found("product", product_id))?;
    if self.repo.get_offer(offer_id).await?.is_none() {
      return Err(EngineError::not_found("offer", offer_id));
    }

    let item = OfferItem::new(offer_id, product_id, quantity, product.reference_price);
    match self.repo.insert_offer_item(&item).await {
      Ok(()) => Ok(item),
      Err(RepoError::Conflict { .. }) => {
        debug!("Concurrent offer item insert, re-reading");
        let existing = self
          .repo
          .find_offer_item(offer_id, product_id)
          .await?
          .ok_or_else(|| EngineError::not_found("offer item", format!("{offer_id}/{product_id}")))?;
        self.overwrite_quantity(existing, quantity).await
      }
      Err(e) => Err(e.into()),
    }
  }

  async fn overwrite_quantity(&self, mut item: OfferItem, quantity: u32) -> Result<OfferItem> {
    if item.quantity != quantity {
      self.repo.set_offer_item_quantity(item.id, quantity).await?;
      item.quantity = quantity;
    }
    Ok(item)
  }

  /// Remove zero-quantity lines of an offer.
  pub async fn prune_empty_offer_items(&self, offer_id: OfferId) -> Result<usize> {
    let removed = self.repo.delete_empty_offer_items(offer_id).await?;
    info!(offer_id = %offer_id, removed, "Empty offer items pruned");
    Ok(removed)
  }

  /// Per-product offered quantity of a cycle with the suppliers behind it.
  #[instrument(skip(self), fields(cycle = %cycle_id))]
  pub async fn available_by_product(&self, cycle_id: CycleId) -> Result<Vec<ProductAvailability>> {
    let lines = self.repo.list_offer_lines(cycle_id).await?;
    let availability = aggregate_offers(&lines);
    debug!(lines = lines.len(), products = availability.len(), "Offers aggregated");
    Ok(availability)
  }

  /// The supplier's active products, most offered first.
  ///
  /// History covers prior cycles only; a cycle still collecting offers does
  /// not count. A history lookup failure degrades to name order instead of failing
  /// the request; the product list itself must load.
  #[instrument(skip(self), fields(supplier = %supplier_id))]
  pub async fn most_offered_products(&self, supplier_id: SupplierId) -> Result<Vec<Product>> {
    let products = self.repo.list_supplier_products(supplier_id).await?;

    let history = match self.repo.supplier_offer_history(supplier_id).await {
      Ok(history) => history,
      Err(e) => {
        warn!(error = %e, "Offer history unavailable, falling back to name order");
        Vec::new()
      }
    };

    Ok(rank_products(&products, &history, self.ranking_window))
  }

  /// Regenerate the supplier orders of a cycle from its offers.
  #[instrument(skip(self), fields(cycle = %cycle_id))]
  pub async fn derive_supplier_orders(&self, cycle_id: CycleId) -> Result<Vec<SupplierOrder>> {
    let lines = self.repo.list_offer_lines(cycle_id).await?;
    let orders = derive_supplier_orders(cycle_id, &lines);
    self.repo.replace_supplier_orders(cycle_id, &orders).await?;
    info!(orders = orders.len(), "Supplier orders derived");
    Ok(orders)
  }
}

/// Reject negative quantities and narrow to the stored width.
pub(crate) fn checked_quantity(quantity: i64) -> Result<u32> {
  if quantity < 0 {
    return Err(EngineError::ValidationRejected(
      DomainError::NegativeQuantity { quantity }.to_string(),
    ));
  }
  u32::try_from(quantity)
    .map_err(|_| EngineError::ValidationRejected(format!("quantity {quantity} out of range")))
}
