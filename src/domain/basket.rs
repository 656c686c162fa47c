//! Basket templates, reserved system baskets and compositions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{BasketId, CompositionId, CycleId, ProductId};

/// Reserved basket backing the "additional items" flow.
pub const ADDITIONAL_ITEMS_BASKET_ID: BasketId = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0001);

/// Reserved basket backing the "extra orders" flow.
pub const EXTRA_ORDERS_BASKET_ID: BasketId = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0002);

/// The two reserved system baskets present in every deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemBasket {
    AdditionalItems,
    ExtraOrders,
}

impl SystemBasket {
    pub const ALL: [Self; 2] = [Self::AdditionalItems, Self::ExtraOrders];

    pub const fn id(self) -> BasketId {
        match self {
            Self::AdditionalItems => ADDITIONAL_ITEMS_BASKET_ID,
            Self::ExtraOrders => EXTRA_ORDERS_BASKET_ID,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::AdditionalItems => "Itens Adicionais",
            Self::ExtraOrders => "Pedidos Extras",
        }
    }

    /// Resolve a basket id to a reserved basket, if it is one.
    pub fn from_id(id: BasketId) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.id() == id)
    }

    /// Template record used by the bootstrap step.
    pub fn template(self) -> Basket {
        Basket {
            id: self.id(),
            name: self.name().to_string(),
            max_value: Decimal::ZERO,
            status: BasketStatus::Ativo,
            items: Vec::new(),
        }
    }
}

/// Whether a basket template can be used in new cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasketStatus {
    Ativo,
    Inativo,
}

/// One product line of a basket template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketItem {
    pub product_id: ProductId,
    /// Units of the product in each basket.
    pub quantity: u32,
}

/// Reusable named bundle with a value ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    pub id: BasketId,
    pub name: String,
    /// Maximum value of one basket.
    pub max_value: Decimal,
    pub status: BasketStatus,
    /// Fixed product list.
    pub items: Vec<BasketItem>,
}

impl Basket {
    pub fn new(name: impl Into<String>, max_value: Decimal, items: Vec<BasketItem>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            max_value,
            status: BasketStatus::Ativo,
            items,
        }
    }

    pub fn is_system(&self) -> bool {
        SystemBasket::from_id(self.id).is_some()
    }
}

/// Quantity of a basket instance within a cycle.
///
/// Unique on (cycle, basket).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition {
    pub id: CompositionId,
    pub cycle_id: CycleId,
    pub basket_id: BasketId,
    pub quantity: u32,
}

impl Composition {
    pub fn new(cycle_id: CycleId, basket_id: BasketId, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle_id,
            basket_id,
            quantity,
        }
    }
}
