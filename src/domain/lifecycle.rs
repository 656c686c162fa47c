//! Cycle lifecycle state machine.
//!
//! `oferta → composicao → atribuicao → finalizado`, linear, no regression.
//! Transitions are administrative actions; nothing here promotes a cycle
//! based on time.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::cycle::{Cycle, CycleStatus};
use super::error::DomainError;
use super::market::CompositionStatus;

/// Why a cycle does not accept consumer orders right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClosedReason {
    /// The cycle has no lifecycle stage yet.
    NoStatus,
    /// The stage is past (or not) `oferta`.
    NotInOffer(CycleStatus),
    /// `now` is before the offer window.
    OfferNotStarted,
    /// `now` is after the offer window.
    OfferEnded,
}

impl std::fmt::Display for ClosedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoStatus => write!(f, "no status"),
            Self::NotInOffer(status) => write!(f, "cycle is in '{status}', not 'oferta'"),
            Self::OfferNotStarted => write!(f, "offer period has not started"),
            Self::OfferEnded => write!(f, "offer period has ended"),
        }
    }
}

/// Result of an open-for-orders check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderWindow {
    pub open: bool,
    pub reason: Option<ClosedReason>,
}

impl OrderWindow {
    const fn open() -> Self {
        Self {
            open: true,
            reason: None,
        }
    }

    const fn closed(reason: ClosedReason) -> Self {
        Self {
            open: false,
            reason: Some(reason),
        }
    }
}

/// What applying a transition would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The cycle moves to the requested stage.
    Advance(CycleStatus),
    /// The cycle is already there.
    Unchanged,
}

/// Count of markets per composition status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MarketStatusCounts {
    pub pendente: usize,
    pub em_andamento: usize,
    pub concluida: usize,
}

/// Stage rules for cycles.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleLifecycle;

impl CycleLifecycle {
    /// Whether consumers may place orders at `now`.
    ///
    /// Status presence, stage and both window bounds are checked
    /// independently; each failure carries its own reason.
    pub fn is_open_for_orders(cycle: &Cycle, now: DateTime<Utc>) -> OrderWindow {
        let Some(status) = cycle.status else {
            return OrderWindow::closed(ClosedReason::NoStatus);
        };
        if status != CycleStatus::Oferta {
            return OrderWindow::closed(ClosedReason::NotInOffer(status));
        }
        if now < cycle.offer_window.start {
            return OrderWindow::closed(ClosedReason::OfferNotStarted);
        }
        if now > cycle.offer_window.end {
            return OrderWindow::closed(ClosedReason::OfferEnded);
        }
        OrderWindow::open()
    }

    /// Check a requested stage change.
    ///
    /// The first assignment must be `oferta`; afterwards only the immediate
    /// successor is legal. Re-applying the current stage is a no-op.
    pub fn validate_transition(
        from: Option<CycleStatus>,
        to: CycleStatus,
    ) -> Result<Transition, DomainError> {
        let legal = match from {
            None => to == CycleStatus::Oferta,
            Some(current) if current == to => return Ok(Transition::Unchanged),
            Some(current) => current.next() == Some(to),
        };

        if legal {
            Ok(Transition::Advance(to))
        } else {
            Err(DomainError::IllegalTransition { from, to })
        }
    }

    /// True iff every market is concluded; vacuously true with no markets.
    pub fn all_markets_concluded(cycle: &Cycle) -> bool {
        cycle.markets.iter().all(|m| m.is_concluded())
    }

    /// Per-status market counts for reporting.
    pub fn market_status_counts(cycle: &Cycle) -> MarketStatusCounts {
        cycle
            .markets
            .iter()
            .fold(MarketStatusCounts::default(), |mut acc, m| {
                match m.status {
                    CompositionStatus::Pendente => acc.pendente += 1,
                    CompositionStatus::EmAndamento => acc.em_andamento += 1,
                    CompositionStatus::Concluida => acc.concluida += 1,
                }
                acc
            })
    }
}
