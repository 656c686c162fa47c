//! Persistence Adapters - In-memory Store with JSON Snapshots
//!
//! `MemoryStore` implements every repository port in process.
//! `StateStore` persists its state as atomic JSON snapshots so a restart
//! picks up where the last run stopped. No database dependency.

pub mod memory;
pub mod state;

pub use memory::{MemoryStore, StoreState, StoreStats};
pub use state::StateStore;
