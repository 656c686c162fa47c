//! Repository Ports - Storage Interface per Entity
//!
//! Typed async read/write operations over the externally owned store.
//! Contract shared by every method:
//! - lookups return `Ok(None)` when the row does not exist
//! - keyed updates on a missing row return `RepoError::NotFound`
//! - inserts that collide with a uniqueness key return `RepoError::Conflict`
//!   (the store enforces (cycle, supplier), (offer, product),
//!   (cycle, consumer), (order, product), (cycle, basket) and
//!   (cycle, ordem))
//! - anything else is `RepoError::Storage`
//!
//! Use cases depend on the narrowest trait they need so each one can be
//! mocked in isolation.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::basket::{Basket, Composition};
use crate::domain::cycle::{Cycle, CycleStatus, DeliveryWindow};
use crate::domain::ids::{
  BasketId, CompositionId, ConsumerId, ConsumerOrderId, ConsumerOrderItemId, CycleId,
  MarketId, OfferId, OfferItemId, ProductId, SupplierId,
};
use crate::domain::market::{CompositionStatus, Market};
use crate::domain::offer::{Offer, OfferItem, OfferLine, Product, SupplierOrder};
use crate::domain::order::{ConsumerOrder, ConsumerOrderItem};
use crate::domain::ranking::OfferHistoryEntry;

/// Port-level failure, kept apart from "no rows".
#[derive(Error, Debug)]
pub enum RepoError {
  /// A keyed update or delete targeted a missing row.
  #[error("{entity} not found: {key}")]
  NotFound {
    /// Entity kind.
    entity: &'static str,
    /// Key that was looked up.
    key: String,
  },

  /// A uniqueness constraint rejected an insert.
  #[error("{entity} already exists: {key}")]
  Conflict {
    /// Entity kind.
    entity: &'static str,
    /// Duplicated key.
    key: String,
  },

  /// The backing store failed.
  #[error("storage failure: {0}")]
  Storage(#[from] anyhow::Error),
}

impl RepoError {
  /// Shorthand for a not-found error keyed by any displayable value.
  pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
    Self::NotFound {
      entity,
      key: key.to_string(),
    }
  }

  /// Shorthand for a uniqueness conflict.
  pub fn conflict(entity: &'static str, key: impl std::fmt::Display) -> Self {
    Self::Conflict {
      entity,
      key: key.to_string(),
    }
  }
}

/// Result alias for port calls.
pub type RepoResult<T> = Result<T, RepoError>;

/// Rows that still reference a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleDependents {
  /// Markets of the cycle.
  pub markets: usize,
  /// Basket compositions of the cycle.
  pub compositions: usize,
  /// Supplier offers of the cycle.
  pub offers: usize,
  /// Consumer orders of the cycle.
  pub orders: usize,
}

impl CycleDependents {
  /// True when nothing references the cycle any more.
  pub const fn is_empty(&self) -> bool {
    self.markets == 0 && self.compositions == 0 && self.offers == 0 && self.orders == 0
  }
}

/// Cycles, their markets and delivery windows.
#[async_trait]
pub trait CycleRepository: Send + Sync + 'static {
  /// Load a cycle with all its markets (ordered by `ordem`) in one read.
  ///
  /// Gating decisions are computed from this snapshot.
  async fn load_cycle(&self, cycle_id: CycleId) -> RepoResult<Option<Cycle>>;

  /// List all cycles with their markets, newest first.
  async fn list_cycles(&self) -> RepoResult<Vec<Cycle>>;

  /// Insert a cycle together with its markets.
  async fn insert_cycle(&self, cycle: &Cycle) -> RepoResult<()>;

  /// Overwrite a cycle's header fields. Markets and the lifecycle stage are
  /// left untouched; the stage only moves through `set_cycle_status`.
  async fn update_cycle(&self, cycle: &Cycle) -> RepoResult<()>;

  /// Set the lifecycle stage.
  async fn set_cycle_status(&self, cycle_id: CycleId, status: CycleStatus) -> RepoResult<()>;

  /// Delete a cycle row and its delivery windows. Other children are not
  /// touched.
  async fn delete_cycle(&self, cycle_id: CycleId) -> RepoResult<()>;

  /// Count rows that reference the cycle.
  async fn dependents(&self, cycle_id: CycleId) -> RepoResult<CycleDependents>;

  /// Insert a market; a taken `ordem` within the cycle is a conflict.
  async fn insert_market(&self, market: &Market) -> RepoResult<()>;

  /// Set a market's composition status.
  async fn set_market_status(
    &self,
    market_id: MarketId,
    status: CompositionStatus,
  ) -> RepoResult<()>;

  /// Delete all windows of the cycle, then insert `windows`.
  async fn replace_delivery_windows(
    &self,
    cycle_id: CycleId,
    windows: &[DeliveryWindow],
  ) -> RepoResult<()>;

  /// Delivery windows of a cycle ordered by start.
  async fn list_delivery_windows(&self, cycle_id: CycleId) -> RepoResult<Vec<DeliveryWindow>>;
}

/// Basket templates.
#[async_trait]
pub trait BasketRepository: Send + Sync + 'static {
  /// Find a basket by id.
  async fn get_basket(&self, basket_id: BasketId) -> RepoResult<Option<Basket>>;

  /// Insert a basket; an existing id is a conflict.
  async fn insert_basket(&self, basket: &Basket) -> RepoResult<()>;

  /// All baskets ordered by name.
  async fn list_baskets(&self) -> RepoResult<Vec<Basket>>;
}

/// Basket compositions per cycle.
#[async_trait]
pub trait CompositionRepository: Send + Sync + 'static {
  /// Find the composition of a basket in a cycle.
  async fn find_composition(
    &self,
    cycle_id: CycleId,
    basket_id: BasketId,
  ) -> RepoResult<Option<Composition>>;

  /// Insert a composition; an existing (cycle, basket) is a conflict.
  async fn insert_composition(&self, composition: &Composition) -> RepoResult<()>;

  /// Overwrite the basket quantity of a composition.
  async fn set_composition_quantity(
    &self,
    composition_id: CompositionId,
    quantity: u32,
  ) -> RepoResult<()>;

  /// Compositions of a cycle in insertion order.
  async fn list_compositions(&self, cycle_id: CycleId) -> RepoResult<Vec<Composition>>;
}

/// Supplier products.
#[async_trait]
pub trait ProductRepository: Send + Sync + 'static {
  /// Find a product by id.
  async fn get_product(&self, product_id: ProductId) -> RepoResult<Option<Product>>;

  /// Insert a product.
  async fn insert_product(&self, product: &Product) -> RepoResult<()>;

  /// All products of a supplier, deleted ones included.
  async fn list_supplier_products(&self, supplier_id: SupplierId) -> RepoResult<Vec<Product>>;
}

/// Supplier offers, offer items and derived supplier orders.
#[async_trait]
pub trait OfferRepository: Send + Sync + 'static {
  /// Find the offer of a supplier in a cycle.
  async fn find_offer(
    &self,
    cycle_id: CycleId,
    supplier_id: SupplierId,
  ) -> RepoResult<Option<Offer>>;

  /// Find an offer by id.
  async fn get_offer(&self, offer_id: OfferId) -> RepoResult<Option<Offer>>;

  /// Insert an offer; an existing (cycle, supplier) is a conflict.
  async fn insert_offer(&self, offer: &Offer) -> RepoResult<()>;

  /// Find the line of a product in an offer.
  async fn find_offer_item(
    &self,
    offer_id: OfferId,
    product_id: ProductId,
  ) -> RepoResult<Option<OfferItem>>;

  /// Insert an offer line; an existing (offer, product) is a conflict.
  async fn insert_offer_item(&self, item: &OfferItem) -> RepoResult<()>;

  /// Overwrite the quantity of an offer line.
  async fn set_offer_item_quantity(&self, item_id: OfferItemId, quantity: u32) -> RepoResult<()>;

  /// Lines of an offer.
  async fn list_offer_items(&self, offer_id: OfferId) -> RepoResult<Vec<OfferItem>>;

  /// Delete the zero-quantity lines of an offer; returns how many went.
  async fn delete_empty_offer_items(&self, offer_id: OfferId) -> RepoResult<usize>;

  /// Flattened (supplier, product, quantity) lines of every offer in a cycle.
  async fn list_offer_lines(&self, cycle_id: CycleId) -> RepoResult<Vec<OfferLine>>;

  /// Offer lines the supplier submitted in prior cycles, with each cycle's
  /// date. Cycles still in the `oferta` stage are left out.
  async fn supplier_offer_history(
    &self,
    supplier_id: SupplierId,
  ) -> RepoResult<Vec<OfferHistoryEntry>>;

  /// Delete the cycle's supplier orders, then insert `orders`.
  async fn replace_supplier_orders(
    &self,
    cycle_id: CycleId,
    orders: &[SupplierOrder],
  ) -> RepoResult<()>;

  /// Supplier orders of a cycle.
  async fn list_supplier_orders(&self, cycle_id: CycleId) -> RepoResult<Vec<SupplierOrder>>;
}

/// Consumer orders and their items.
#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
  /// Find the order of a consumer in a cycle.
  async fn find_consumer_order(
    &self,
    cycle_id: CycleId,
    consumer_id: ConsumerId,
  ) -> RepoResult<Option<ConsumerOrder>>;

  /// Find an order by id.
  async fn get_consumer_order(&self, order_id: ConsumerOrderId)
    -> RepoResult<Option<ConsumerOrder>>;

  /// Insert an order; an existing (cycle, consumer) is a conflict.
  async fn insert_consumer_order(&self, order: &ConsumerOrder) -> RepoResult<()>;

  /// Overwrite the status of an order.
  async fn set_consumer_order_status(
    &self,
    order_id: ConsumerOrderId,
    status: &str,
  ) -> RepoResult<()>;

  /// Find the line of a product in an order.
  async fn find_order_item(
    &self,
    order_id: ConsumerOrderId,
    product_id: ProductId,
  ) -> RepoResult<Option<ConsumerOrderItem>>;

  /// Insert an order line; an existing (order, product) is a conflict.
  async fn insert_order_item(&self, item: &ConsumerOrderItem) -> RepoResult<()>;

  /// Overwrite the quantity of an order line.
  async fn set_order_item_quantity(
    &self,
    item_id: ConsumerOrderItemId,
    quantity: u32,
  ) -> RepoResult<()>;

  /// Lines of an order.
  async fn list_order_items(&self, order_id: ConsumerOrderId) -> RepoResult<Vec<ConsumerOrderItem>>;

  /// Delete the zero-quantity lines of an order; returns how many went.
  async fn delete_empty_order_items(&self, order_id: ConsumerOrderId) -> RepoResult<usize>;

  /// Lines of every order of a cycle.
  async fn list_cycle_order_items(&self, cycle_id: CycleId) -> RepoResult<Vec<ConsumerOrderItem>>;
}

/// A single store serving every port.
pub trait Store:
  CycleRepository
  + BasketRepository
  + CompositionRepository
  + ProductRepository
  + OfferRepository
  + OrderRepository
{
}

impl<T> Store for T where
  T: CycleRepository
    + BasketRepository
    + CompositionRepository
    + ProductRepository
    + OfferRepository
    + OrderRepository
{
}
