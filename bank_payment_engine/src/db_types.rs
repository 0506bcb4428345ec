use std::{fmt::Display, str::FromStr};

pub use bpg_common::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------      OrderId       ---------------------------------------------------------
/// The storefront's identifier for an order. This is the number customers quote in their transfer memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(i64);

impl OrderId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// The stable reference string for the order. It is fixed when the order is created and is known to both the
    /// payer-facing client and the reconciliation path, so it doubles as the real-time notification topic.
    pub fn topic(&self) -> String {
        format!("order-{}", self.0)
    }
}

impl From<i64> for OrderId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order id: {0}")]
pub struct OrderIdParseError(String);

impl FromStr for OrderId {
    type Err = OrderIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self).map_err(|e| OrderIdParseError(format!("{s}. {e}")))
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been created and no payment has been applied to it yet.
    Pending,
    /// A bank transfer has been matched to the order and applied.
    Paid,
    /// The order stayed unpaid past its time-to-live and was cancelled.
    Cancelled,
}

impl OrderStatusType {
    /// `Paid` and `Cancelled` are terminal. Nothing ever transitions out of them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct OrderStatusParseError(String);

impl FromStr for OrderStatusType {
    type Err = OrderStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(OrderStatusParseError(s.to_string())),
        }
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatusType,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_amount: Option<Money>,
    /// The provider that delivered the transfer that paid this order
    pub payment_provider: Option<String>,
    /// The provider's transaction id for the transfer that paid this order
    pub payment_ref: Option<String>,
}

impl Order {
    /// True when the payment on record is the transfer identified by `key` (provider id, provider transaction id).
    pub fn is_paid_by(&self, key: (&str, &str)) -> bool {
        self.payment_provider.as_deref() == Some(key.0) && self.payment_ref.as_deref() == Some(key.1)
    }
}

//--------------------------------------       NewOrder       ---------------------------------------------------------
/// Orders are created by the checkout flow. The backends expose an insert so that the checkout flow (and tests) can
/// seed them.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(id: OrderId, total_price: Money) -> Self {
        Self { id, total_price, created_at: Utc::now() }
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

//--------------------------------------    PaymentFields     ---------------------------------------------------------
/// The fields written, exactly once, when an order transitions from `Pending` to `Paid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFields {
    pub amount: Money,
    pub payment_provider: String,
    pub payment_ref: String,
    pub paid_at: DateTime<Utc>,
}

//--------------------------------------   CompareAndSetResult  -------------------------------------------------------
/// The result of a conditional status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareAndSetResult {
    /// The guard held and the order was updated. Contains the order as written.
    Updated(Order),
    /// The order's status did not match the expected status. Contains the order as it currently is.
    Conflict(Order),
    /// There is no order with the given id.
    NotFound,
}

//--------------------------------------     PaymentEvent     ---------------------------------------------------------
/// A canonical bank transfer notification, normalised from a provider-specific webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentEvent {
    pub provider_id: String,
    pub external_txn_id: String,
    pub amount: Money,
    pub memo: String,
    pub received_at: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn new<S1, S2, S3>(provider_id: S1, external_txn_id: S2, amount: Money, memo: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            provider_id: provider_id.into(),
            external_txn_id: external_txn_id.into(),
            amount,
            memo: memo.into(),
            received_at: Utc::now(),
        }
    }

    pub fn received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Identifies a unique payment notification across redeliveries.
    pub fn idempotency_key(&self) -> (&str, &str) {
        (self.provider_id.as_str(), self.external_txn_id.as_str())
    }
}

impl Display for PaymentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {} \"{}\"", self.provider_id, self.external_txn_id, self.amount, self.memo)
    }
}
