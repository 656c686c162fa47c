//! Cycle Market Engine - Library Root
//!
//! Re-exports all layers for the binary, integration tests and benchmarks.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod usecases;

pub use error::{EngineError, Result};
