//! Cycle-scoped markets.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{CycleId, MarketId};

/// How a market's supply is sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleType {
    /// Fixed-composition baskets ("cestas").
    Basket,
    /// Lots assembled from offers.
    Lot,
    /// Products sold individually, no basket/lot structure.
    DirectSale,
}

impl std::fmt::Display for SaleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basket => write!(f, "cesta"),
            Self::Lot => write!(f, "lote"),
            Self::DirectSale => write!(f, "venda_direta"),
        }
    }
}

/// Composition progress of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionStatus {
    Pendente,
    EmAndamento,
    Concluida,
}

impl std::fmt::Display for CompositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pendente => write!(f, "pendente"),
            Self::EmAndamento => write!(f, "em_andamento"),
            Self::Concluida => write!(f, "concluida"),
        }
    }
}

/// A unit of composition work inside a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub cycle_id: CycleId,
    pub sale_type: SaleType,
    /// 1-based sequence position, unique within the cycle.
    pub ordem: i32,
    pub status: CompositionStatus,
}

impl Market {
    /// Create a pending market at the given position.
    pub fn new(cycle_id: CycleId, sale_type: SaleType, ordem: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle_id,
            sale_type,
            ordem,
            status: CompositionStatus::Pendente,
        }
    }

    pub fn is_concluded(&self) -> bool {
        self.status == CompositionStatus::Concluida
    }

    /// Pending or in progress.
    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            CompositionStatus::Pendente | CompositionStatus::EmAndamento
        )
    }
}
