//! Market gating.
//!
//! Composition inside a cycle runs market by market in `ordem` sequence:
//! a market may only start once the market immediately before it is
//! concluded. Every decision here is a pure function over an
//! already-loaded cycle snapshot, and a missing predecessor resolves to
//! "blocked" rather than to an error.

use serde::Serialize;

use super::cycle::Cycle;
use super::ids::MarketId;
use super::market::{CompositionStatus, Market, SaleType};

/// Why a direct-sale market cannot be released to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReleaseDenial {
    /// The market is a basket or lot market.
    NotDirectSale,
    /// The cycle is switched off.
    CycleInactive,
    /// Nothing has been composed in the market yet.
    NothingComposed,
}

impl std::fmt::Display for ReleaseDenial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotDirectSale => write!(f, "Não é venda direta"),
            Self::CycleInactive => write!(f, "Ciclo não está ativo"),
            Self::NothingComposed => write!(f, "Nenhum item composto"),
        }
    }
}

/// Outcome of a direct-sale release check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReleaseDecision {
    pub allowed: bool,
    pub reason: Option<ReleaseDenial>,
}

impl ReleaseDecision {
    const fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    const fn deny(reason: ReleaseDenial) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Sequential-gating rules for the markets of a cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketGate;

impl MarketGate {
    /// Whether `market` must wait before composition can start or continue.
    ///
    /// - inactive cycle: always blocked
    /// - `ordem == 1`: never blocked by predecessor logic
    /// - otherwise: blocked unless the market at `ordem - 1` exists and is
    ///   concluded
    pub fn is_blocked(cycle: &Cycle, market: &Market) -> bool {
        if !cycle.is_active() {
            return true;
        }
        if market.ordem == 1 {
            return false;
        }

        cycle
            .market_at(market.ordem - 1)
            .is_none_or(|predecessor| !predecessor.is_concluded())
    }

    /// The market an administrator is working on.
    ///
    /// A preferred id wins when it belongs to the cycle; otherwise the first
    /// market in progress, then the first pending one.
    pub fn current_market(cycle: &Cycle, preferred: Option<MarketId>) -> Option<&Market> {
        if let Some(market) = preferred.and_then(|id| cycle.market(id)) {
            return Some(market);
        }

        cycle
            .markets
            .iter()
            .find(|m| m.status == CompositionStatus::EmAndamento)
            .or_else(|| {
                cycle
                    .markets
                    .iter()
                    .find(|m| m.status == CompositionStatus::Pendente)
            })
    }

    /// First unblocked market that still has composition work, in cycle order.
    pub fn next_pending_market(cycle: &Cycle) -> Option<&Market> {
        cycle
            .markets
            .iter()
            .filter(|m| !Self::is_blocked(cycle, m))
            .find(|m| m.is_open())
    }

    /// Whether a direct-sale market may be shown to consumers.
    ///
    /// Checks run in order (sale type, cycle, composed items) and the first
    /// failure decides the reason.
    pub fn release_direct_sale(cycle: &Cycle, market: &Market) -> ReleaseDecision {
        if market.sale_type != SaleType::DirectSale {
            return ReleaseDecision::deny(ReleaseDenial::NotDirectSale);
        }
        if !cycle.is_active() {
            return ReleaseDecision::deny(ReleaseDenial::CycleInactive);
        }
        if market.status == CompositionStatus::Pendente {
            return ReleaseDecision::deny(ReleaseDenial::NothingComposed);
        }
        ReleaseDecision::allow()
    }
}
