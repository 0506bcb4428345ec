use std::future::Future;

use chrono::{DateTime, Duration, Utc};

use crate::db_types::{CompareAndSetResult, Order, OrderId, OrderStatusType, PaymentFields};

/// The order store collaborator.
///
/// Implementations must make `compare_and_set_paid` and `compare_and_set_cancelled` atomic with respect to each other
/// for the same order: the status check and the write happen as one operation, or not at all.
pub trait OrderStore: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches the order whose id was extracted from a transfer memo.
    fn fetch_order_by_matched_id(&self, id: OrderId) -> impl Future<Output = Result<Option<Order>, Self::Error>> + Send;

    /// Marks the order as `Paid` and writes the payment fields, iff its status is currently `expected`.
    fn compare_and_set_paid(
        &self,
        id: OrderId,
        expected: OrderStatusType,
        payment: PaymentFields,
    ) -> impl Future<Output = Result<CompareAndSetResult, Self::Error>> + Send;

    /// Marks the order as `Cancelled`, iff its status is currently `expected`.
    fn compare_and_set_cancelled(
        &self,
        id: OrderId,
        expected: OrderStatusType,
    ) -> impl Future<Output = Result<CompareAndSetResult, Self::Error>> + Send;

    /// Returns all `Pending` orders created at or before `cutoff`, oldest first.
    fn list_pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Order>, Self::Error>> + Send;

    /// Returns all orders that have been `Pending` for at least `ttl`.
    fn list_stale_pending(&self, ttl: Duration) -> impl Future<Output = Result<Vec<Order>, Self::Error>> + Send {
        self.list_pending_created_before(Utc::now() - ttl)
    }
}
