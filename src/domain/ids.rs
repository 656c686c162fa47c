//! Entity identifiers.
//!
//! Plain `Uuid` aliases used across domain, ports and adapters. The
//! reserved system baskets use fixed identities (see `basket.rs`).

use uuid::Uuid;

// ────────────────────────────────────────────
// Type aliases consumed by ports and adapters
// ────────────────────────────────────────────

/// Sales cycle identifier.
pub type CycleId = Uuid;

/// Cycle-scoped market identifier.
pub type MarketId = Uuid;

/// Basket template identifier.
pub type BasketId = Uuid;

/// Composition row identifier.
pub type CompositionId = Uuid;

/// Product identifier.
pub type ProductId = Uuid;

/// Supplier identifier.
pub type SupplierId = Uuid;

/// Consumer identifier.
pub type ConsumerId = Uuid;

/// Supplier offer identifier.
pub type OfferId = Uuid;

/// Offer line identifier.
pub type OfferItemId = Uuid;

/// Consumer order identifier.
pub type ConsumerOrderId = Uuid;

/// Consumer order line identifier.
pub type ConsumerOrderItemId = Uuid;

/// Delivery point reference.
pub type DeliveryPointId = Uuid;
