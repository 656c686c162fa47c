//! Bootstrap - Reserved System Basket Seeding
//!
//! Runs at startup, before any request is served, and again before a cycle
//! composition provisions its reserved entries.

use tracing::{info, instrument};

use crate::domain::basket::SystemBasket;
use crate::error::Result;
use crate::ports::repository::{BasketRepository, RepoError};

/// Make sure both reserved baskets exist.
///
/// Idempotent: existing rows are left alone and a concurrent insert that
/// wins the race counts as present. Returns how many baskets were created.
#[instrument(skip(repo))]
pub async fn ensure_system_baskets<R: BasketRepository + ?Sized>(repo: &R) -> Result<usize> {
  let mut created = 0;

  for system in SystemBasket::ALL {
    if repo.get_basket(system.id()).await?.is_some() {
      continue;
    }

    match repo.insert_basket(&system.template()).await {
      Ok(()) => {
        created += 1;
        info!(basket_id = %system.id(), name = system.name(), "System basket provisioned");
      }
      Err(RepoError::Conflict { .. }) => {}
      Err(e) => return Err(e.into()),
    }
  }

  Ok(created)
}
