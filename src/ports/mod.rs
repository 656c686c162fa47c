//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `CycleRepository`: cycles, markets, delivery windows
//! - `BasketRepository` / `CompositionRepository`: basket templates and
//!   per-cycle compositions
//! - `ProductRepository` / `OfferRepository`: supplier catalog, offers and
//!   derived supplier orders
//! - `OrderRepository`: consumer orders

pub mod repository;

pub use repository::{
  BasketRepository, CompositionRepository, CycleDependents, CycleRepository, OfferRepository,
  OrderRepository, ProductRepository, RepoError, RepoResult, Store,
};
