//! Domain rule violations.
//!
//! Returned by constructors and validators in the domain layer. Gating
//! decisions never produce these; they resolve to plain booleans.

use thiserror::Error;

use super::cycle::CycleStatus;
use super::ids::MarketId;

/// Errors raised when a domain invariant would be broken.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Stage transitions only move forward one step at a time.
    #[error("illegal cycle transition from {from:?} to {to}")]
    IllegalTransition {
        /// Current status (absent for a fresh cycle).
        from: Option<CycleStatus>,
        /// Requested status.
        to: CycleStatus,
    },

    /// Market sequence positions are 1-based.
    #[error("market {market_id} has invalid ordem {ordem}")]
    InvalidOrdem {
        /// Offending market.
        market_id: MarketId,
        /// The ordem that was provided.
        ordem: i32,
    },

    /// Two markets of one cycle share a sequence position.
    #[error("duplicate market ordem {ordem} within cycle")]
    DuplicateOrdem {
        /// The repeated ordem.
        ordem: i32,
    },

    /// A quantity field received a negative value.
    #[error("quantity must not be negative, got {quantity}")]
    NegativeQuantity {
        /// The rejected quantity.
        quantity: i64,
    },

    /// A time window ends before it starts.
    #[error("window '{window}' ends before it starts")]
    InvertedWindow {
        /// Which window failed.
        window: &'static str,
    },

    /// The market is gated behind an unfinished predecessor.
    #[error("market {market_id} is blocked by its predecessor")]
    MarketBlocked {
        /// The blocked market.
        market_id: MarketId,
    },
}
