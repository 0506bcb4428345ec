use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    bpe_api::ReconciliationError,
    db::traits::OrderStore,
    db_types::{CompareAndSetResult, Order, OrderId, OrderStatusType},
    events::{EventProducers, OrderExpiredEvent},
};

/// The result of one expiry sweep.
#[derive(Debug, Clone, Default)]
pub struct ExpiryResult {
    /// Orders that were moved from `Pending` to `Cancelled`
    pub cancelled: Vec<Order>,
    /// Candidates whose status changed between selection and update (usually because they were just paid)
    pub skipped: Vec<OrderId>,
    /// Candidates whose update failed with a store error. They are picked up again by the next sweep.
    pub failed: Vec<OrderId>,
}

impl ExpiryResult {
    pub fn is_empty(&self) -> bool {
        self.cancelled.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }
}

pub struct ExpiryApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> std::fmt::Debug for ExpiryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExpiryApi")
    }
}

impl<B: Clone> Clone for ExpiryApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone() }
    }
}

impl<B> ExpiryApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> ExpiryApi<B>
where B: OrderStore
{
    /// Cancels every order that has been `Pending` for at least `ttl`.
    pub async fn expire_stale_orders(&self, ttl: Duration) -> Result<ExpiryResult, ReconciliationError> {
        self.expire_orders_created_before(Utc::now() - ttl).await
    }

    /// Cancels every `Pending` order created at or before `cutoff`.
    ///
    /// Each candidate is cancelled with its own conditional write, so an order that is paid after it was selected is
    /// left alone.
    pub async fn expire_orders_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<ExpiryResult, ReconciliationError> {
        let candidates = self.db.list_pending_created_before(cutoff).await.map_err(ReconciliationError::store)?;
        trace!("🕰️ {} expiry candidates created before {cutoff}", candidates.len());
        let mut result = ExpiryResult::default();
        for candidate in candidates {
            match self.db.compare_and_set_cancelled(candidate.id, OrderStatusType::Pending).await {
                Ok(CompareAndSetResult::Updated(order)) => {
                    info!("🕰️ Order #{} was not paid in time and has been cancelled", order.id);
                    self.producers.publish_order_expired(OrderExpiredEvent::new(order.clone()));
                    result.cancelled.push(order);
                },
                Ok(CompareAndSetResult::Conflict(current)) => {
                    debug!("🕰️ Order #{} became {} before it could be cancelled. Skipping", current.id, current.status);
                    result.skipped.push(current.id);
                },
                Ok(CompareAndSetResult::NotFound) => {
                    debug!("🕰️ Order #{} disappeared before it could be cancelled. Skipping", candidate.id);
                    result.skipped.push(candidate.id);
                },
                Err(e) => {
                    error!("🕰️ Could not cancel order #{}: {e}", candidate.id);
                    result.failed.push(candidate.id);
                },
            }
        }
        Ok(result)
    }
}
