use serde::{Deserialize, Serialize};

use crate::db_types::{Money, Order, OrderStatusType};

/// Attached to a payment whose amount differs from the order total. The payment is still applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountDiscrepancy {
    pub expected: Money,
    pub received: Money,
}

impl AmountDiscrepancy {
    pub fn check(expected: Money, received: Money) -> Option<Self> {
        (expected != received).then_some(Self { expected, received })
    }

    /// Positive when the customer overpaid, negative when they underpaid.
    pub fn difference(&self) -> Money {
        self.received - self.expected
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAppliedEvent {
    /// The order as written by the `Pending -> Paid` transition
    pub order: Order,
    /// The amount the customer actually transferred
    pub amount: Money,
    pub provider_id: String,
    pub external_txn_id: String,
    pub discrepancy: Option<AmountDiscrepancy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderExpiredEvent {
    pub order: Order,
}

impl OrderExpiredEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// The message pushed to clients waiting on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPush {
    pub order_ref: String,
    pub amount: Money,
    pub status: OrderStatusType,
}

impl From<&PaymentAppliedEvent> for OrderPush {
    fn from(event: &PaymentAppliedEvent) -> Self {
        Self { order_ref: event.order.id.topic(), amount: event.amount, status: event.order.status }
    }
}

impl From<&OrderExpiredEvent> for OrderPush {
    fn from(event: &OrderExpiredEvent) -> Self {
        Self { order_ref: event.order.id.topic(), amount: event.order.total_price, status: event.order.status }
    }
}
