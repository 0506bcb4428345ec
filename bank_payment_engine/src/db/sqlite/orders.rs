//! Order queries for the SQLite backend.
//!
//! The functions in this module take a bare connection. They are not atomic on their own; embed them in a transaction
//! and pass `&mut *tx` if you need atomicity across calls. The compare-and-set functions are atomic individually,
//! since the status guard is part of the `UPDATE` statement itself.
use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{CompareAndSetResult, NewOrder, Order, OrderId, OrderStatusType, PaymentFields},
};

const ORDER_COLUMNS: &str =
    "id, status, total_price, created_at, updated_at, paid_at, payment_amount, payment_provider, payment_ref";

/// Inserts a new `Pending` order. Returns an error if an order with the same id already exists.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, SqliteDatabaseError> {
    if fetch_order_by_id(order.id, conn).await?.is_some() {
        return Err(SqliteDatabaseError::DuplicateOrder(order.id));
    }
    let sql = format!(
        "INSERT INTO orders (id, status, total_price, created_at, updated_at) VALUES ($1, $2, $3, $4, $4) RETURNING \
         {ORDER_COLUMNS}"
    );
    let record = sqlx::query_as::<_, Order>(&sql)
        .bind(order.id)
        .bind(OrderStatusType::Pending)
        .bind(order.total_price)
        .bind(order.created_at)
        .fetch_one(conn)
        .await?;
    debug!("🗃️ Order #{} has been saved in the DB", record.id);
    Ok(record)
}

pub async fn fetch_order_by_id(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(id).fetch_optional(conn).await?;
    Ok(order)
}

/// Sets the status to `Paid` along with the payment fields, guarded by the current status being `expected`, and by the
/// payment fields never having been written before.
pub async fn compare_and_set_paid(
    id: OrderId,
    expected: OrderStatusType,
    payment: PaymentFields,
    conn: &mut SqliteConnection,
) -> Result<CompareAndSetResult, SqliteDatabaseError> {
    let sql = format!(
        "UPDATE orders SET status = $1, paid_at = $2, payment_amount = $3, payment_provider = $4, payment_ref = $5, \
         updated_at = $6 WHERE id = $7 AND status = $8 AND paid_at IS NULL RETURNING {ORDER_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, Order>(&sql)
        .bind(OrderStatusType::Paid)
        .bind(payment.paid_at)
        .bind(payment.amount)
        .bind(payment.payment_provider)
        .bind(payment.payment_ref)
        .bind(Utc::now())
        .bind(id)
        .bind(expected)
        .fetch_optional(&mut *conn)
        .await?;
    trace!("🗃️ compare_and_set_paid for order #{id} updated: {}", updated.is_some());
    resolve_cas(id, updated, conn).await
}

pub async fn compare_and_set_cancelled(
    id: OrderId,
    expected: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<CompareAndSetResult, SqliteDatabaseError> {
    let sql = format!(
        "UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4 RETURNING {ORDER_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, Order>(&sql)
        .bind(OrderStatusType::Cancelled)
        .bind(Utc::now())
        .bind(id)
        .bind(expected)
        .fetch_optional(&mut *conn)
        .await?;
    trace!("🗃️ compare_and_set_cancelled for order #{id} updated: {}", updated.is_some());
    resolve_cas(id, updated, conn).await
}

async fn resolve_cas(
    id: OrderId,
    updated: Option<Order>,
    conn: &mut SqliteConnection,
) -> Result<CompareAndSetResult, SqliteDatabaseError> {
    match updated {
        Some(order) => Ok(CompareAndSetResult::Updated(order)),
        None => {
            let current = fetch_order_by_id(id, conn).await?;
            Ok(current.map(CompareAndSetResult::Conflict).unwrap_or(CompareAndSetResult::NotFound))
        },
    }
}

/// Fetches `Pending` orders created at or before `cutoff`, oldest first.
///
/// Timestamps are compared through `julianday` so that values written with different fractional-second precision
/// still order correctly.
pub async fn fetch_pending_created_before(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 AND julianday(created_at) <= julianday($2) ORDER BY \
         julianday(created_at) ASC"
    );
    let orders = sqlx::query_as::<_, Order>(&sql).bind(OrderStatusType::Pending).bind(cutoff).fetch_all(conn).await?;
    trace!("🗃️ {} pending orders were created before {cutoff}", orders.len());
    Ok(orders)
}
