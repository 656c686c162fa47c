//! Consumer orders and demand consolidation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{ConsumerId, ConsumerOrderId, ConsumerOrderItemId, CycleId, ProductId};
use super::offer::ProductAvailability;

/// Canonical status value of a closed consumer order.
pub const STATUS_FINALIZADO: &str = "finalizado";

/// Status given to a freshly created consumer order.
pub const STATUS_ABERTO: &str = "aberto";

/// A consumer's requests within a cycle. Unique on (cycle, consumer).
///
/// The status is stored as a free value; only `"finalizado"` carries meaning
/// for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerOrder {
    pub id: ConsumerOrderId,
    pub cycle_id: CycleId,
    pub consumer_id: ConsumerId,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl ConsumerOrder {
    pub fn new(cycle_id: CycleId, consumer_id: ConsumerId) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle_id,
            consumer_id,
            status: STATUS_ABERTO.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.status == STATUS_FINALIZADO
    }
}

/// One requested product. Unique on (order, product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerOrderItem {
    pub id: ConsumerOrderItemId,
    pub order_id: ConsumerOrderId,
    pub product_id: ProductId,
    /// Zero marks the line as removable by explicit cleanup.
    pub quantity: u32,
}

impl ConsumerOrderItem {
    pub fn new(order_id: ConsumerOrderId, product_id: ProductId, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id,
            quantity,
        }
    }
}

/// Where a consumer stands in a cycle.
///
/// Keeps "never ordered" apart from "ordered, not yet finalized".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderState {
    NeverOrdered,
    Open { status: String },
    Finalized,
}

impl From<Option<&ConsumerOrder>> for OrderState {
    fn from(order: Option<&ConsumerOrder>) -> Self {
        match order {
            None => Self::NeverOrdered,
            Some(o) if o.is_finalized() => Self::Finalized,
            Some(o) => Self::Open {
                status: o.status.clone(),
            },
        }
    }
}

/// Ordered vs offered totals for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandLine {
    pub product_id: ProductId,
    pub ordered: u64,
    pub available: u64,
    /// Ordered quantity that supply cannot cover.
    pub shortfall: u64,
}

/// Consolidate order lines against offered availability.
///
/// Every product that is either ordered or offered appears once, ordered by
/// product id.
pub fn consolidate_demand(
    items: &[ConsumerOrderItem],
    availability: &[ProductAvailability],
) -> Vec<DemandLine> {
    let mut lines: BTreeMap<ProductId, DemandLine> = BTreeMap::new();
    let blank = |product_id| DemandLine {
        product_id,
        ordered: 0,
        available: 0,
        shortfall: 0,
    };

    for item in items {
        lines
            .entry(item.product_id)
            .or_insert_with(|| blank(item.product_id))
            .ordered += u64::from(item.quantity);
    }
    for supply in availability {
        lines
            .entry(supply.product_id)
            .or_insert_with(|| blank(supply.product_id))
            .available += supply.total_quantity;
    }

    lines
        .into_values()
        .map(|mut line| {
            line.shortfall = line.ordered.saturating_sub(line.available);
            line
        })
        .collect()
}
