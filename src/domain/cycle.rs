//! Sales cycle entity and its time windows.
//!
//! A cycle carries two independent status notions:
//! - `activation` (ativo/inativo) drives market gating and direct-sale release
//! - `status` (oferta → composicao → atribuicao → finalizado) is the lifecycle
//!   stage, absent until an administrator assigns the first one

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DomainError;
use super::ids::{CycleId, DeliveryPointId, MarketId};
use super::market::Market;

/// Lifecycle stage of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// Suppliers submit offers, consumers may order inside the offer window.
    Oferta,
    /// Administrators assemble baskets and lots.
    Composicao,
    /// Composed items are assigned to consumers.
    Atribuicao,
    /// Cycle closed.
    Finalizado,
}

impl CycleStatus {
    /// The stage that follows this one, if any.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Oferta => Some(Self::Composicao),
            Self::Composicao => Some(Self::Atribuicao),
            Self::Atribuicao => Some(Self::Finalizado),
            Self::Finalizado => None,
        }
    }
}

impl std::fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oferta => write!(f, "oferta"),
            Self::Composicao => write!(f, "composicao"),
            Self::Atribuicao => write!(f, "atribuicao"),
            Self::Finalizado => write!(f, "finalizado"),
        }
    }
}

/// Whether the cycle is switched on for composition and release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Ativo,
    Inativo,
}

/// Closed time interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// True when `at` lies inside the window, bounds included.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    fn validate(&self, window: &'static str) -> Result<(), DomainError> {
        if self.end < self.start {
            return Err(DomainError::InvertedWindow { window });
        }
        Ok(())
    }
}

/// Supplier delivery slot for a cycle.
///
/// Never edited in place: updating a cycle deletes the cycle's windows and
/// recreates them from the incoming list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryWindow {
    pub id: Uuid,
    pub cycle_id: CycleId,
    pub window: TimeWindow,
}

impl DeliveryWindow {
    pub fn new(cycle_id: CycleId, window: TimeWindow) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle_id,
            window,
        }
    }
}

/// A time-boxed instance of the marketplace process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub id: CycleId,
    pub name: String,
    pub delivery_point_id: DeliveryPointId,
    /// Offer period; consumer orders are accepted only inside it.
    pub offer_window: TimeWindow,
    /// Period for additional-item requests.
    pub additional_items_window: TimeWindow,
    /// Consumer pickup period.
    pub pickup_window: TimeWindow,
    pub activation: Activation,
    /// Lifecycle stage; `None` until first assigned.
    pub status: Option<CycleStatus>,
    /// Markets ordered by `ordem`.
    pub markets: Vec<Market>,
    pub created_at: DateTime<Utc>,
}

impl Cycle {
    /// Create an active cycle with no stage and no markets.
    pub fn new(
        name: impl Into<String>,
        delivery_point_id: DeliveryPointId,
        offer_window: TimeWindow,
        additional_items_window: TimeWindow,
        pickup_window: TimeWindow,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            delivery_point_id,
            offer_window,
            additional_items_window,
            pickup_window,
            activation: Activation::Ativo,
            status: None,
            markets: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.activation == Activation::Ativo
    }

    /// Look up a market of this cycle by id.
    pub fn market(&self, market_id: MarketId) -> Option<&Market> {
        self.markets.iter().find(|m| m.id == market_id)
    }

    /// Look up the market occupying a sequence position.
    pub fn market_at(&self, ordem: i32) -> Option<&Market> {
        self.markets.iter().find(|m| m.ordem == ordem)
    }

    /// Keep markets in sequence order.
    pub fn sort_markets(&mut self) {
        self.markets.sort_by_key(|m| m.ordem);
    }

    /// Check windows and market sequence positions.
    ///
    /// Positions must be >= 1 and unique; gaps are allowed.
    pub fn validate(&self) -> Result<(), DomainError> {
        self.offer_window.validate("oferta")?;
        self.additional_items_window.validate("itens_adicionais")?;
        self.pickup_window.validate("retirada")?;

        let mut seen = HashSet::new();
        for market in &self.markets {
            if market.ordem < 1 {
                return Err(DomainError::InvalidOrdem {
                    market_id: market.id,
                    ordem: market.ordem,
                });
            }
            if !seen.insert(market.ordem) {
                return Err(DomainError::DuplicateOrdem {
                    ordem: market.ordem,
                });
            }
        }
        Ok(())
    }
}
