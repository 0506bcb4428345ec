//! An in-memory [`OrderStore`] backend.
//!
//! All state lives behind a single mutex inside the store instance (clones share it). The status check and the write
//! of each compare-and-set happen under one lock acquisition, which gives the same atomicity as the conditional
//! `UPDATE` in the SQLite backend.
//!
//! The store can also be switched to "unavailable", or given an artificial latency, to exercise store failure and
//! timeout handling. Latency can be added before an operation touches any state, or after a write has been applied and
//! before the caller hears about it.
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration as StdDuration,
};

use chrono::{DateTime, Utc};
use log::*;
use parking_lot::Mutex;
use thiserror::Error;

use crate::{
    db::traits::OrderStore,
    db_types::{CompareAndSetResult, NewOrder, Order, OrderId, OrderStatusType, PaymentFields},
};

#[derive(Debug, Clone, Error)]
pub enum MemoryStoreError {
    #[error("The order store is unavailable")]
    Unavailable,
    #[error("Cannot insert duplicate order #{0}")]
    DuplicateOrder(OrderId),
}

#[derive(Clone, Default)]
pub struct MemoryOrderStore {
    orders: Arc<Mutex<BTreeMap<OrderId, Order>>>,
    unavailable: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
    ack_latency_ms: Arc<AtomicU64>,
}

impl std::fmt::Debug for MemoryOrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemoryOrderStore ({} orders)", self.orders.lock().len())
    }
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_order(&self, order: NewOrder) -> Result<Order, MemoryStoreError> {
        let mut orders = self.orders.lock();
        if orders.contains_key(&order.id) {
            return Err(MemoryStoreError::DuplicateOrder(order.id));
        }
        let record = Order {
            id: order.id,
            status: OrderStatusType::Pending,
            total_price: order.total_price,
            created_at: order.created_at,
            updated_at: order.created_at,
            paid_at: None,
            payment_amount: None,
            payment_provider: None,
            payment_ref: None,
        };
        orders.insert(order.id, record.clone());
        debug!("🗃️ Order #{} has been saved in the memory store", order.id);
        Ok(record)
    }

    /// When set, every store operation fails with [`MemoryStoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delays every store operation by the given duration before it touches any state.
    pub fn set_latency(&self, latency: StdDuration) {
        self.latency_ms.store(as_millis(latency), Ordering::SeqCst);
    }

    /// Delays the reply of every write by the given duration. The write itself is applied immediately.
    pub fn set_ack_latency(&self, latency: StdDuration) {
        self.ack_latency_ms.store(as_millis(latency), Ordering::SeqCst);
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().len()
    }

    async fn gate(&self) -> Result<(), MemoryStoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(StdDuration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MemoryStoreError::Unavailable);
        }
        Ok(())
    }

    async fn acknowledge(&self) {
        let latency = self.ack_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(StdDuration::from_millis(latency)).await;
        }
    }

    fn compare_and_set<F>(&self, id: OrderId, expected: OrderStatusType, update: F) -> CompareAndSetResult
    where F: FnOnce(&mut Order) {
        let mut orders = self.orders.lock();
        match orders.get_mut(&id) {
            None => CompareAndSetResult::NotFound,
            Some(order) if order.status != expected => CompareAndSetResult::Conflict(order.clone()),
            Some(order) => {
                update(order);
                CompareAndSetResult::Updated(order.clone())
            },
        }
    }
}

fn as_millis(duration: StdDuration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl OrderStore for MemoryOrderStore {
    type Error = MemoryStoreError;

    async fn fetch_order_by_matched_id(&self, id: OrderId) -> Result<Option<Order>, Self::Error> {
        self.gate().await?;
        Ok(self.orders.lock().get(&id).cloned())
    }

    async fn compare_and_set_paid(
        &self,
        id: OrderId,
        expected: OrderStatusType,
        payment: PaymentFields,
    ) -> Result<CompareAndSetResult, Self::Error> {
        self.gate().await?;
        let result = self.compare_and_set(id, expected, |order| {
            order.status = OrderStatusType::Paid;
            order.paid_at = Some(payment.paid_at);
            order.payment_amount = Some(payment.amount);
            order.payment_provider = Some(payment.payment_provider);
            order.payment_ref = Some(payment.payment_ref);
            order.updated_at = Utc::now();
        });
        trace!("🗃️ compare_and_set_paid for order #{id}: {result:?}");
        self.acknowledge().await;
        Ok(result)
    }

    async fn compare_and_set_cancelled(
        &self,
        id: OrderId,
        expected: OrderStatusType,
    ) -> Result<CompareAndSetResult, Self::Error> {
        self.gate().await?;
        let result = self.compare_and_set(id, expected, |order| {
            order.status = OrderStatusType::Cancelled;
            order.updated_at = Utc::now();
        });
        trace!("🗃️ compare_and_set_cancelled for order #{id}: {result:?}");
        self.acknowledge().await;
        Ok(result)
    }

    async fn list_pending_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, Self::Error> {
        self.gate().await?;
        let mut orders = self
            .orders
            .lock()
            .values()
            .filter(|o| o.status == OrderStatusType::Pending && o.created_at <= cutoff)
            .cloned()
            .collect::<Vec<_>>();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }
}
