//! Batch Outcomes - Per-item Results for Multi-row Operations
//!
//! Batch operations never abort on a single bad item. Each item gets its
//! own outcome and the report keeps counts, so "0 of N succeeded" stays
//! visibly different from "N of N succeeded".

use serde::Serialize;

/// What happened to one batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ItemStatus {
  /// A new row was written.
  Created,
  /// An existing row was overwritten.
  Updated,
  /// The row already held the requested value.
  Unchanged,
  /// The item failed a precondition and was skipped.
  Rejected(String),
  /// The store failed for this item.
  Failed(String),
}

impl ItemStatus {
  /// Created, updated or already in place.
  pub const fn is_success(&self) -> bool {
    matches!(self, Self::Created | Self::Updated | Self::Unchanged)
  }
}

/// Outcome of a single batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome<K> {
  /// Identifies the item (e.g. the basket id).
  pub key: K,
  /// Result for this item.
  pub status: ItemStatus,
}

/// Aggregated report of a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport<K> {
  /// Individual outcomes in input order.
  pub outcomes: Vec<ItemOutcome<K>>,
  /// Items created, updated or unchanged.
  pub succeeded: usize,
  /// Items skipped on validation.
  pub rejected: usize,
  /// Items that hit a storage failure.
  pub failed: usize,
}

impl<K> BatchReport<K> {
  /// Build a report and its counts from individual outcomes.
  pub fn from_outcomes(outcomes: Vec<ItemOutcome<K>>) -> Self {
    let succeeded = outcomes.iter().filter(|o| o.status.is_success()).count();
    let rejected = outcomes
      .iter()
      .filter(|o| matches!(o.status, ItemStatus::Rejected(_)))
      .count();
    let failed = outcomes.len() - succeeded - rejected;

    Self {
      outcomes,
      succeeded,
      rejected,
      failed,
    }
  }

  /// Every item went through.
  pub fn all_succeeded(&self) -> bool {
    self.succeeded == self.outcomes.len()
  }

  /// Items were submitted and none went through.
  pub fn is_total_failure(&self) -> bool {
    !self.outcomes.is_empty() && self.succeeded == 0
  }
}

impl<K: PartialEq> BatchReport<K> {
  /// Outcome for a given key, if it was part of the batch.
  pub fn outcome(&self, key: &K) -> Option<&ItemStatus> {
    self.outcomes.iter().find(|o| &o.key == key).map(|o| &o.status)
  }
}
