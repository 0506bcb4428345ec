use std::fmt::Display;

use bank_payment_engine::{
    db_types::{Money, Order, OrderStatusType, PaymentEvent},
    ReconcileOutcome,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

/// The body of a webhook response. Every delivery that was authenticated and parsed gets `success: true`, including
/// transfers that were deliberately not applied, so that providers do not redeliver them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<TransferResult>,
}

impl WebhookResponse {
    pub fn new(results: Vec<TransferResult>) -> Self {
        let applied = results.iter().filter(|r| r.outcome == "applied").count();
        let message = format!("{} transfers received, {applied} applied", results.len());
        Self { success: true, message, results }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub external_txn_id: String,
    pub outcome: String,
    pub order_ref: Option<String>,
}

impl TransferResult {
    pub fn new(event: &PaymentEvent, outcome: &ReconcileOutcome) -> Self {
        Self {
            external_txn_id: event.external_txn_id.clone(),
            outcome: outcome.to_string(),
            order_ref: outcome.order_id().map(|id| id.topic()),
        }
    }
}

/// The current state of an order, for clients that need to catch up after missing a push.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_ref: String,
    pub status: OrderStatusType,
    pub total: Money,
    pub payment_amount: Option<Money>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            order_ref: order.id.topic(),
            status: order.status,
            total: order.total_price,
            payment_amount: order.payment_amount,
            paid_at: order.paid_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeQuery {
    pub order_id: Option<i64>,
}
