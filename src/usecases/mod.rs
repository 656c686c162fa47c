//! Use Cases Layer - Application Workflows
//!
//! Orchestrates domain rules with the repository ports. Each use case is
//! generic over the narrowest port set it needs and holds the store in an
//! `Arc`.
//!
//! Use cases:
//! - `MarketCoordinator`: cycle administration, gating queries, market workflow
//! - `OfferAggregator`: supplier offers, availability, product ranking
//! - `BasketCompositionEngine`: compositions per cycle, allocation plan
//! - `OrderConsolidator`: consumer orders, demand totals
//! - `ConsumerOrderFinalizer`: order closing
//! - `bootstrap`: reserved basket seeding at startup

pub mod basket_composition;
pub mod batch;
pub mod bootstrap;
pub mod market_coordinator;
pub mod offer_aggregator;
pub mod order_consolidator;
pub mod order_finalizer;

pub use basket_composition::{BasketCompositionEngine, BasketRequest};
pub use batch::{BatchReport, ItemOutcome, ItemStatus};
pub use bootstrap::ensure_system_baskets;
pub use market_coordinator::MarketCoordinator;
pub use offer_aggregator::OfferAggregator;
pub use order_consolidator::OrderConsolidator;
pub use order_finalizer::ConsumerOrderFinalizer;
