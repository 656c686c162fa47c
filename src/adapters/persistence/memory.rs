//! Memory Store - In-process Adapter for Every Repository Port
//!
//! Keeps all rows in a single `StoreState` behind a tokio `RwLock` and
//! enforces the uniqueness keys the ports promise, so find-or-create races
//! surface as `RepoError::Conflict` exactly as they would against a
//! database. `StateStore` snapshots the state to disk.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::basket::{Basket, Composition};
use crate::domain::cycle::{Cycle, CycleStatus, DeliveryWindow};
use crate::domain::ids::{
    BasketId, CompositionId, ConsumerId, ConsumerOrderId, ConsumerOrderItemId, CycleId, MarketId,
    OfferId, OfferItemId, ProductId, SupplierId,
};
use crate::domain::market::{CompositionStatus, Market};
use crate::domain::offer::{Offer, OfferItem, OfferLine, Product, SupplierOrder};
use crate::domain::order::{ConsumerOrder, ConsumerOrderItem};
use crate::domain::ranking::OfferHistoryEntry;
use crate::ports::repository::{
    BasketRepository, CompositionRepository, CycleDependents, CycleRepository, OfferRepository,
    OrderRepository, ProductRepository, RepoError, RepoResult,
};

/// Every persisted row, in insertion order per table.
///
/// Cycles are stored without their markets; `load_cycle` joins them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    pub cycles: Vec<Cycle>,
    pub markets: Vec<Market>,
    pub delivery_windows: Vec<DeliveryWindow>,
    pub baskets: Vec<Basket>,
    pub compositions: Vec<Composition>,
    pub products: Vec<Product>,
    pub offers: Vec<Offer>,
    pub offer_items: Vec<OfferItem>,
    pub supplier_orders: Vec<SupplierOrder>,
    pub orders: Vec<ConsumerOrder>,
    pub order_items: Vec<ConsumerOrderItem>,
}

impl StoreState {
    fn assemble(&self, header: &Cycle) -> Cycle {
        let mut cycle = header.clone();
        cycle.markets = self
            .markets
            .iter()
            .filter(|m| m.cycle_id == header.id)
            .cloned()
            .collect();
        cycle.sort_markets();
        cycle
    }

    fn cycle_mut(&mut self, cycle_id: CycleId) -> RepoResult<&mut Cycle> {
        self.cycles
            .iter_mut()
            .find(|c| c.id == cycle_id)
            .ok_or_else(|| RepoError::not_found("cycle", cycle_id))
    }
}

/// Row counts per table, for logging and metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub cycles: usize,
    pub markets: usize,
    pub offers: usize,
    pub orders: usize,
}

/// In-memory store serving every repository port.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded from a snapshot.
    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Copy of the current state for snapshotting.
    pub async fn snapshot(&self) -> StoreState {
        self.state.read().await.clone()
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        StoreStats {
            cycles: state.cycles.len(),
            markets: state.markets.len(),
            offers: state.offers.len(),
            orders: state.orders.len(),
        }
    }
}

#[async_trait]
impl CycleRepository for MemoryStore {
    async fn load_cycle(&self, cycle_id: CycleId) -> RepoResult<Option<Cycle>> {
        let state = self.state.read().await;
        Ok(state
            .cycles
            .iter()
            .find(|c| c.id == cycle_id)
            .map(|c| state.assemble(c)))
    }

    async fn list_cycles(&self) -> RepoResult<Vec<Cycle>> {
        let state = self.state.read().await;
        let mut cycles: Vec<Cycle> = state.cycles.iter().map(|c| state.assemble(c)).collect();
        cycles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cycles)
    }

    async fn insert_cycle(&self, cycle: &Cycle) -> RepoResult<()> {
        let mut state = self.state.write().await;
        if state.cycles.iter().any(|c| c.id == cycle.id) {
            return Err(RepoError::conflict("cycle", cycle.id));
        }

        let mut seen = HashSet::new();
        for market in &cycle.markets {
            if !seen.insert(market.ordem) {
                return Err(RepoError::conflict(
                    "market",
                    format!("{}/{}", cycle.id, market.ordem),
                ));
            }
        }

        let mut header = cycle.clone();
        let markets = std::mem::take(&mut header.markets);
        state.cycles.push(header);
        state.markets.extend(markets);
        Ok(())
    }

    async fn update_cycle(&self, cycle: &Cycle) -> RepoResult<()> {
        let mut state = self.state.write().await;
        let stored = state.cycle_mut(cycle.id)?;
        let mut header = cycle.clone();
        header.markets.clear();
        header.status = stored.status;
        *stored = header;
        Ok(())
    }

    async fn set_cycle_status(&self, cycle_id: CycleId, status: CycleStatus) -> RepoResult<()> {
        let mut state = self.state.write().await;
        state.cycle_mut(cycle_id)?.status = Some(status);
        Ok(())
    }

    async fn delete_cycle(&self, cycle_id: CycleId) -> RepoResult<()> {
        let mut state = self.state.write().await;
        let before = state.cycles.len();
        state.cycles.retain(|c| c.id != cycle_id);
        if state.cycles.len() == before {
            return Err(RepoError::not_found("cycle", cycle_id));
        }
        state.delivery_windows.retain(|w| w.cycle_id != cycle_id);
        Ok(())
    }

    async fn dependents(&self, cycle_id: CycleId) -> RepoResult<CycleDependents> {
        let state = self.state.read().await;
        Ok(CycleDependents {
            markets: state.markets.iter().filter(|m| m.cycle_id == cycle_id).count(),
            compositions: state
                .compositions
                .iter()
                .filter(|c| c.cycle_id == cycle_id)
                .count(),
            offers: state.offers.iter().filter(|o| o.cycle_id == cycle_id).count(),
            orders: state.orders.iter().filter(|o| o.cycle_id == cycle_id).count(),
        })
    }

    async fn insert_market(&self, market: &Market) -> RepoResult<()> {
        let mut state = self.state.write().await;
        if !state.cycles.iter().any(|c| c.id == market.cycle_id) {
            return Err(RepoError::not_found("cycle", market.cycle_id));
        }
        if state
            .markets
            .iter()
            .any(|m| m.id == market.id || (m.cycle_id == market.cycle_id && m.ordem == market.ordem))
        {
            return Err(RepoError::conflict(
                "market",
                format!("{}/{}", market.cycle_id, market.ordem),
            ));
        }
        state.markets.push(market.clone());
        Ok(())
    }

    async fn set_market_status(
        &self,
        market_id: MarketId,
        status: CompositionStatus,
    ) -> RepoResult<()> {
        let mut state = self.state.write().await;
        let market = state
            .markets
            .iter_mut()
            .find(|m| m.id == market_id)
            .ok_or_else(|| RepoError::not_found("market", market_id))?;
        market.status = status;
        Ok(())
    }

    async fn replace_delivery_windows(
        &self,
        cycle_id: CycleId,
        windows: &[DeliveryWindow],
    ) -> RepoResult<()> {
        let mut state = self.state.write().await;
        state.delivery_windows.retain(|w| w.cycle_id != cycle_id);
        state.delivery_windows.extend_from_slice(windows);
        debug!(cycle = %cycle_id, windows = windows.len(), "Delivery windows replaced");
        Ok(())
    }

    async fn list_delivery_windows(&self, cycle_id: CycleId) -> RepoResult<Vec<DeliveryWindow>> {
        let state = self.state.read().await;
        let mut windows: Vec<DeliveryWindow> = state
            .delivery_windows
            .iter()
            .filter(|w| w.cycle_id == cycle_id)
            .cloned()
            .collect();
        windows.sort_by_key(|w| w.window.start);
        Ok(windows)
    }
}

#[async_trait]
impl BasketRepository for MemoryStore {
    async fn get_basket(&self, basket_id: BasketId) -> RepoResult<Option<Basket>> {
        let state = self.state.read().await;
        Ok(state.baskets.iter().find(|b| b.id == basket_id).cloned())
    }

    async fn insert_basket(&self, basket: &Basket) -> RepoResult<()> {
        let mut state = self.state.write().await;
        if state.baskets.iter().any(|b| b.id == basket.id) {
            return Err(RepoError::conflict("basket", basket.id));
        }
        state.baskets.push(basket.clone());
        Ok(())
    }

    async fn list_baskets(&self) -> RepoResult<Vec<Basket>> {
        let state = self.state.read().await;
        let mut baskets = state.baskets.clone();
        baskets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(baskets)
    }
}

#[async_trait]
impl CompositionRepository for MemoryStore {
    async fn find_composition(
        &self,
        cycle_id: CycleId,
        basket_id: BasketId,
    ) -> RepoResult<Option<Composition>> {
        let state = self.state.read().await;
        Ok(state
            .compositions
            .iter()
            .find(|c| c.cycle_id == cycle_id && c.basket_id == basket_id)
            .cloned())
    }

    async fn insert_composition(&self, composition: &Composition) -> RepoResult<()> {
        let mut state = self.state.write().await;
        if state
            .compositions
            .iter()
            .any(|c| c.cycle_id == composition.cycle_id && c.basket_id == composition.basket_id)
        {
            return Err(RepoError::conflict(
                "composition",
                format!("{}/{}", composition.cycle_id, composition.basket_id),
            ));
        }
        state.compositions.push(composition.clone());
        Ok(())
    }

    async fn set_composition_quantity(
        &self,
        composition_id: CompositionId,
        quantity: u32,
    ) -> RepoResult<()> {
        let mut state = self.state.write().await;
        let composition = state
            .compositions
            .iter_mut()
            .find(|c| c.id == composition_id)
            .ok_or_else(|| RepoError::not_found("composition", composition_id))?;
        composition.quantity = quantity;
        Ok(())
    }

    async fn list_compositions(&self, cycle_id: CycleId) -> RepoResult<Vec<Composition>> {
        let state = self.state.read().await;
        Ok(state
            .compositions
            .iter()
            .filter(|c| c.cycle_id == cycle_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn get_product(&self, product_id: ProductId) -> RepoResult<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.iter().find(|p| p.id == product_id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> RepoResult<()> {
        let mut state = self.state.write().await;
        if state.products.iter().any(|p| p.id == product.id) {
            return Err(RepoError::conflict("product", product.id));
        }
        state.products.push(product.clone());
        Ok(())
    }

    async fn list_supplier_products(&self, supplier_id: SupplierId) -> RepoResult<Vec<Product>> {
        let state = self.state.read().await;
        Ok(state
            .products
            .iter()
            .filter(|p| p.supplier_id == supplier_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OfferRepository for MemoryStore {
    async fn find_offer(
        &self,
        cycle_id: CycleId,
        supplier_id: SupplierId,
    ) -> RepoResult<Option<Offer>> {
        let state = self.state.read().await;
        Ok(state
            .offers
            .iter()
            .find(|o| o.cycle_id == cycle_id && o.supplier_id == supplier_id)
            .cloned())
    }

    async fn get_offer(&self, offer_id: OfferId) -> RepoResult<Option<Offer>> {
        let state = self.state.read().await;
        Ok(state.offers.iter().find(|o| o.id == offer_id).cloned())
    }

    async fn insert_offer(&self, offer: &Offer) -> RepoResult<()> {
        let mut state = self.state.write().await;
        if state
            .offers
            .iter()
            .any(|o| o.cycle_id == offer.cycle_id && o.supplier_id == offer.supplier_id)
        {
            return Err(RepoError::conflict(
                "offer",
                format!("{}/{}", offer.cycle_id, offer.supplier_id),
            ));
        }
        state.offers.push(offer.clone());
        Ok(())
    }

    async fn find_offer_item(
        &self,
        offer_id: OfferId,
        product_id: ProductId,
    ) -> RepoResult<Option<OfferItem>> {
        let state = self.state.read().await;
        Ok(state
            .offer_items
            .iter()
            .find(|i| i.offer_id == offer_id && i.product_id == product_id)
            .cloned())
    }

    async fn insert_offer_item(&self, item: &OfferItem) -> RepoResult<()> {
        let mut state = self.state.write().await;
        if state
            .offer_items
            .iter()
            .any(|i| i.offer_id == item.offer_id && i.product_id == item.product_id)
        {
            return Err(RepoError::conflict(
                "offer item",
                format!("{}/{}", item.offer_id, item.product_id),
            ));
        }
        state.offer_items.push(item.clone());
        Ok(())
    }

    async fn set_offer_item_quantity(&self, item_id: OfferItemId, quantity: u32) -> RepoResult<()> {
        let mut state = self.state.write().await;
        let item = state
            .offer_items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| RepoError::not_found("offer item", item_id))?;
        item.quantity = quantity;
        Ok(())
    }

    async fn list_offer_items(&self, offer_id: OfferId) -> RepoResult<Vec<OfferItem>> {
        let state = self.state.read().await;
        Ok(state
            .offer_items
            .iter()
            .filter(|i| i.offer_id == offer_id)
            .cloned()
            .collect())
    }

    async fn delete_empty_offer_items(&self, offer_id: OfferId) -> RepoResult<usize> {
        let mut state = self.state.write().await;
        let before = state.offer_items.len();
        state
            .offer_items
            .retain(|i| i.offer_id != offer_id || i.quantity > 0);
        Ok(before - state.offer_items.len())
    }

    async fn list_offer_lines(&self, cycle_id: CycleId) -> RepoResult<Vec<OfferLine>> {
        let state = self.state.read().await;
        let mut lines = Vec::new();
        for offer in state.offers.iter().filter(|o| o.cycle_id == cycle_id) {
            lines.extend(
                state
                    .offer_items
                    .iter()
                    .filter(|i| i.offer_id == offer.id)
                    .map(|i| OfferLine {
                        supplier_id: offer.supplier_id,
                        product_id: i.product_id,
                        quantity: i.quantity,
                    }),
            );
        }
        Ok(lines)
    }

    async fn supplier_offer_history(
        &self,
        supplier_id: SupplierId,
    ) -> RepoResult<Vec<OfferHistoryEntry>> {
        let state = self.state.read().await;
        let mut history = Vec::new();
        for offer in state.offers.iter().filter(|o| o.supplier_id == supplier_id) {
            let Some(cycle) = state.cycles.iter().find(|c| c.id == offer.cycle_id) else {
                continue;
            };
            if cycle.status == Some(CycleStatus::Oferta) {
                continue;
            }
            history.extend(
                state
                    .offer_items
                    .iter()
                    .filter(|i| i.offer_id == offer.id)
                    .map(|i| OfferHistoryEntry {
                        cycle_id: cycle.id,
                        cycle_created_at: cycle.created_at,
                        product_id: i.product_id,
                        quantity: i.quantity,
                    }),
            );
        }
        Ok(history)
    }

    async fn replace_supplier_orders(
        &self,
        cycle_id: CycleId,
        orders: &[SupplierOrder],
    ) -> RepoResult<()> {
        let mut state = self.state.write().await;
        state.supplier_orders.retain(|o| o.cycle_id != cycle_id);
        state.supplier_orders.extend_from_slice(orders);
        Ok(())
    }

    async fn list_supplier_orders(&self, cycle_id: CycleId) -> RepoResult<Vec<SupplierOrder>> {
        let state = self.state.read().await;
        Ok(state
            .supplier_orders
            .iter()
            .filter(|o| o.cycle_id == cycle_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn find_consumer_order(
        &self,
        cycle_id: CycleId,
        consumer_id: ConsumerId,
    ) -> RepoResult<Option<ConsumerOrder>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .find(|o| o.cycle_id == cycle_id && o.consumer_id == consumer_id)
            .cloned())
    }

    async fn get_consumer_order(
        &self,
        order_id: ConsumerOrderId,
    ) -> RepoResult<Option<ConsumerOrder>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == order_id).cloned())
    }

    async fn insert_consumer_order(&self, order: &ConsumerOrder) -> RepoResult<()> {
        let mut state = self.state.write().await;
        if state
            .orders
            .iter()
            .any(|o| o.cycle_id == order.cycle_id && o.consumer_id == order.consumer_id)
        {
            return Err(RepoError::conflict(
                "consumer order",
                format!("{}/{}", order.cycle_id, order.consumer_id),
            ));
        }
        state.orders.push(order.clone());
        Ok(())
    }

    async fn set_consumer_order_status(
        &self,
        order_id: ConsumerOrderId,
        status: &str,
    ) -> RepoResult<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| RepoError::not_found("consumer order", order_id))?;
        order.status = status.to_string();
        Ok(())
    }

    async fn find_order_item(
        &self,
        order_id: ConsumerOrderId,
        product_id: ProductId,
    ) -> RepoResult<Option<ConsumerOrderItem>> {
        let state = self.state.read().await;
        Ok(state
            .order_items
            .iter()
            .find(|i| i.order_id == order_id && i.product_id == product_id)
            .cloned())
    }

    async fn insert_order_item(&self, item: &ConsumerOrderItem) -> RepoResult<()> {
        let mut state = self.state.write().await;
        if state
            .order_items
            .iter()
            .any(|i| i.order_id == item.order_id && i.product_id == item.product_id)
        {
            return Err(RepoError::conflict(
                "order item",
                format!("{}/{}", item.order_id, item.product_id),
            ));
        }
        state.order_items.push(item.clone());
        Ok(())
    }

    async fn set_order_item_quantity(
        &self,
        item_id: ConsumerOrderItemId,
        quantity: u32,
    ) -> RepoResult<()> {
        let mut state = self.state.write().await;
        let item = state
            .order_items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| RepoError::not_found("order item", item_id))?;
        item.quantity = quantity;
        Ok(())
    }

    async fn list_order_items(
        &self,
        order_id: ConsumerOrderId,
    ) -> RepoResult<Vec<ConsumerOrderItem>> {
        let state = self.state.read().await;
        Ok(state
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn delete_empty_order_items(&self, order_id: ConsumerOrderId) -> RepoResult<usize> {
        let mut state = self.state.write().await;
        let before = state.order_items.len();
        state
            .order_items
            .retain(|i| i.order_id != order_id || i.quantity > 0);
        Ok(before - state.order_items.len())
    }

    async fn list_cycle_order_items(
        &self,
        cycle_id: CycleId,
    ) -> RepoResult<Vec<ConsumerOrderItem>> {
        let state = self.state.read().await;
        let order_ids: HashSet<ConsumerOrderId> = state
            .orders
            .iter()
            .filter(|o| o.cycle_id == cycle_id)
            .map(|o| o.id)
            .collect();
        Ok(state
            .order_items
            .iter()
            .filter(|i| order_ids.contains(&i.order_id))
            .cloned()
            .collect())
    }
}
