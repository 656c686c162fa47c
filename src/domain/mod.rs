//! Domain layer - Core marketplace entities and workflow rules.
//!
//! Pure types and decision functions for cycles, markets, baskets, offers
//! and consumer orders. No I/O here (hexagonal architecture inner ring);
//! every rule works on data already loaded through the ports.

pub mod allocation;
pub mod basket;
pub mod cycle;
pub mod error;
pub mod gate;
pub mod ids;
pub mod lifecycle;
pub mod market;
pub mod offer;
pub mod order;
pub mod ranking;

// Re-export core types for convenience
pub use basket::{Basket, BasketItem, Composition, SystemBasket};
pub use cycle::{Activation, Cycle, CycleStatus, DeliveryWindow, TimeWindow};
pub use error::DomainError;
pub use gate::{MarketGate, ReleaseDecision, ReleaseDenial};
pub use lifecycle::{ClosedReason, CycleLifecycle, OrderWindow, Transition};
pub use market::{CompositionStatus, Market, SaleType};
pub use offer::{Offer, OfferItem, Product, ProductAvailability, SupplierOrder};
pub use order::{ConsumerOrder, ConsumerOrderItem, OrderState};
