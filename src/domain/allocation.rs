//! Assignment of offered supply to basket product lists.
//!
//! Compositions are served in the order given. Each one takes, product by
//! product, as much of the remaining supply as its baskets require; what is
//! left over flows to the next composition.

use std::collections::HashMap;

use serde::Serialize;

use super::basket::{Basket, Composition};
use super::ids::{BasketId, CompositionId, ProductId};
use super::offer::ProductAvailability;

/// Supply assigned to one product line of a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineAllocation {
    pub product_id: ProductId,
    pub required: u64,
    pub allocated: u64,
    pub shortfall: u64,
}

/// Supply assigned to one composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositionAllocation {
    pub composition_id: CompositionId,
    pub basket_id: BasketId,
    pub requested_baskets: u32,
    /// Baskets that can be assembled in full from the allocated supply.
    pub complete_baskets: u64,
    pub lines: Vec<LineAllocation>,
}

/// Allocation for a whole cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationPlan {
    pub compositions: Vec<CompositionAllocation>,
    /// Supply not consumed by any composition, by product.
    pub leftover: HashMap<ProductId, u64>,
}

impl AllocationPlan {
    /// True when every line of every composition is fully covered.
    pub fn is_fully_covered(&self) -> bool {
        self.compositions
            .iter()
            .flat_map(|c| &c.lines)
            .all(|l| l.shortfall == 0)
    }
}

/// Walk compositions in order and assign available supply to them.
pub fn plan_allocation(
    compositions: &[(Composition, Basket)],
    availability: &[ProductAvailability],
) -> AllocationPlan {
    let mut remaining: HashMap<ProductId, u64> = availability
        .iter()
        .map(|a| (a.product_id, a.total_quantity))
        .collect();

    let allocations = compositions
        .iter()
        .map(|(composition, basket)| {
            let lines: Vec<LineAllocation> = basket
                .items
                .iter()
                .map(|item| {
                    let required = u64::from(item.quantity) * u64::from(composition.quantity);
                    let stock = remaining.entry(item.product_id).or_insert(0);
                    let allocated = required.min(*stock);
                    *stock -= allocated;
                    LineAllocation {
                        product_id: item.product_id,
                        required,
                        allocated,
                        shortfall: required - allocated,
                    }
                })
                .collect();

            let complete_baskets = basket
                .items
                .iter()
                .zip(&lines)
                .filter(|(item, _)| item.quantity > 0)
                .map(|(item, line)| line.allocated / u64::from(item.quantity))
                .min()
                .unwrap_or_else(|| u64::from(composition.quantity));

            CompositionAllocation {
                composition_id: composition.id,
                basket_id: composition.basket_id,
                requested_baskets: composition.quantity,
                complete_baskets,
                lines,
            }
        })
        .collect();

    remaining.retain(|_, qty| *qty > 0);

    AllocationPlan {
        compositions: allocations,
        leftover: remaining,
    }
}
