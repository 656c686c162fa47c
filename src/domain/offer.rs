//! Supplier products, offers and offered availability.
//!
//! `aggregate_offers` and `derive_supplier_orders` are pure: they take the
//! loaded offer lines of one cycle and return fresh accumulators.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{CycleId, OfferId, OfferItemId, ProductId, SupplierId};

/// A product registered by a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub supplier_id: SupplierId,
    pub name: String,
    pub reference_price: Decimal,
    /// Soft-deleted products are kept for history but never offered again.
    pub deleted: bool,
}

impl Product {
    pub fn new(supplier_id: SupplierId, name: impl Into<String>, reference_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            supplier_id,
            name: name.into(),
            reference_price,
            deleted: false,
        }
    }
}

/// A supplier's submission into a cycle. Unique on (cycle, supplier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub cycle_id: CycleId,
    pub supplier_id: SupplierId,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    pub fn new(cycle_id: CycleId, supplier_id: SupplierId) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle_id,
            supplier_id,
            created_at: Utc::now(),
        }
    }
}

/// One offered product. Unique on (offer, product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferItem {
    pub id: OfferItemId,
    pub offer_id: OfferId,
    pub product_id: ProductId,
    /// Zero is a valid stored value; only explicit cleanup removes it.
    pub quantity: u32,
    pub reference_price: Decimal,
}

impl OfferItem {
    pub fn new(offer_id: OfferId, product_id: ProductId, quantity: u32, reference_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            offer_id,
            product_id,
            quantity,
            reference_price,
        }
    }
}

/// Flattened offer line of a cycle: who offered what, how much.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferLine {
    pub supplier_id: SupplierId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A supplier's part of a product's availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierShare {
    pub supplier_id: SupplierId,
    pub quantity: u32,
}

/// Offered quantity of one product across all suppliers of a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAvailability {
    pub product_id: ProductId,
    pub total_quantity: u64,
    /// Suppliers in first-seen order.
    pub suppliers: Vec<SupplierShare>,
}

/// Fulfillment record derived from offer lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierOrder {
    pub id: Uuid,
    pub cycle_id: CycleId,
    pub supplier_id: SupplierId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Consolidate offer lines into per-product availability.
///
/// Zero-quantity lines are ignored. Lines from the same supplier for the
/// same product are summed. Output is ordered by product id.
pub fn aggregate_offers(lines: &[OfferLine]) -> Vec<ProductAvailability> {
    let mut by_product: BTreeMap<ProductId, ProductAvailability> = BTreeMap::new();

    for line in lines.iter().filter(|l| l.quantity > 0) {
        let entry = by_product
            .entry(line.product_id)
            .or_insert_with(|| ProductAvailability {
                product_id: line.product_id,
                total_quantity: 0,
                suppliers: Vec::new(),
            });

        entry.total_quantity += u64::from(line.quantity);
        match entry
            .suppliers
            .iter_mut()
            .find(|s| s.supplier_id == line.supplier_id)
        {
            Some(share) => share.quantity += line.quantity,
            None => entry.suppliers.push(SupplierShare {
                supplier_id: line.supplier_id,
                quantity: line.quantity,
            }),
        }
    }

    by_product.into_values().collect()
}

/// Build the supplier orders of a cycle from its offer lines.
pub fn derive_supplier_orders(cycle_id: CycleId, lines: &[OfferLine]) -> Vec<SupplierOrder> {
    let mut totals: BTreeMap<(SupplierId, ProductId), u32> = BTreeMap::new();
    for line in lines.iter().filter(|l| l.quantity > 0) {
        *totals.entry((line.supplier_id, line.product_id)).or_default() += line.quantity;
    }

    totals
        .into_iter()
        .map(|((supplier_id, product_id), quantity)| SupplierOrder {
            id: Uuid::new_v4(),
            cycle_id,
            supplier_id,
            product_id,
            quantity,
        })
        .collect()
}
