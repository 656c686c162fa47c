//! Consumer Order Finalizer
//!
//! Closes a consumer order by setting its status. The caller decides when
//! an order is complete; no item or quantity check happens here.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::ids::ConsumerOrderId;
use crate::domain::order::ConsumerOrder;
use crate::error::{EngineError, Result};
use crate::ports::repository::OrderRepository;

/// Sets the status of consumer orders.
pub struct ConsumerOrderFinalizer<R: OrderRepository> {
  repo: Arc<R>,
}

impl<R: OrderRepository> ConsumerOrderFinalizer<R> {
  /// Create a new finalizer.
  pub const fn new(repo: Arc<R>) -> Self {
    Self { repo }
  }

  /// Set the order status. Re-applying the current status is a no-op.
  #[instrument(skip(self), fields(order = %order_id))]
  pub async fn finalize(&self, order_id: ConsumerOrderId, status: &str) -> Result<ConsumerOrder> {
    let mut order = self
      .repo
      .get_consumer_order(order_id)
      .await?
      .ok_or_else(|| EngineError::not_found("consumer order", order_id))?;

    if order.status == status {
      return Ok(order);
    }

    self.repo.set_consumer_order_status(order_id, status).await?;
    info!(from = %order.status, to = status, "Consumer order status set");
    order.status = status.to_string();
    Ok(order)
  }
}
