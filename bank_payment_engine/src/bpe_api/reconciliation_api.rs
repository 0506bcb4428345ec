use std::fmt::{Debug, Display};

use log::*;

use crate::{
    bpe_api::ReconciliationError,
    db::traits::OrderStore,
    db_types::{CompareAndSetResult, Order, OrderId, OrderStatusType, PaymentEvent, PaymentFields},
    events::{AmountDiscrepancy, EventProducers, PaymentAppliedEvent},
    helpers::MemoMatcher,
};

/// Transfers that could not be tied to an order are logged under this target so that operators can route them to a
/// separate sink for manual follow-up.
pub const UNMATCHED_LOG_TARGET: &str = "bpg::unmatched";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The order moved from `Pending` to `Paid`.
    Applied { order: Order, discrepancy: Option<AmountDiscrepancy> },
    /// The order was already paid. `duplicate` is true when the payment on record is this very transfer, i.e. the
    /// provider redelivered the notification.
    AlreadyProcessed { order_id: OrderId, duplicate: bool },
    /// The order expired before the payment arrived. The payment is not applied.
    OrderCancelled { order_id: OrderId },
    /// The memo named an order that does not exist.
    OrderNotFound(OrderId),
    /// No order reference could be found in the memo.
    Unmatched,
}

impl ReconcileOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied { .. })
    }

    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            ReconcileOutcome::Applied { order, .. } => Some(order.id),
            ReconcileOutcome::AlreadyProcessed { order_id, .. } => Some(*order_id),
            ReconcileOutcome::OrderCancelled { order_id } => Some(*order_id),
            ReconcileOutcome::OrderNotFound(order_id) => Some(*order_id),
            ReconcileOutcome::Unmatched => None,
        }
    }
}

impl Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileOutcome::Applied { .. } => write!(f, "applied"),
            ReconcileOutcome::AlreadyProcessed { duplicate: true, .. } => write!(f, "duplicate"),
            ReconcileOutcome::AlreadyProcessed { duplicate: false, .. } => write!(f, "already_paid"),
            ReconcileOutcome::OrderCancelled { .. } => write!(f, "order_cancelled"),
            ReconcileOutcome::OrderNotFound(_) => write!(f, "order_not_found"),
            ReconcileOutcome::Unmatched => write!(f, "unmatched"),
        }
    }
}

/// `ReconciliationApi` applies payment notifications to orders.
///
/// Applying a payment is idempotent. Redeliveries of the same transfer, and concurrent deliveries of different
/// transfers for the same order, are resolved by a single conditional `Pending -> Paid` write in the store; whichever
/// call loses that race gets `AlreadyProcessed` (or `OrderCancelled`) and nothing is overwritten.
pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
    matcher: MemoMatcher,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?})", self.matcher)
    }
}

impl<B: Clone> Clone for ReconciliationApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone(), matcher: self.matcher.clone() }
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, matcher: MemoMatcher::default() }
    }

    /// Replaces the default `DH` memo matcher.
    pub fn with_matcher(mut self, matcher: MemoMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> ReconciliationApi<B>
where B: OrderStore
{
    pub async fn apply_payment(&self, event: &PaymentEvent) -> Result<ReconcileOutcome, ReconciliationError> {
        let Some(order_id) = self.matcher.extract_order_id(&event.memo) else {
            info!(target: UNMATCHED_LOG_TARGET, "🔄️💰️ No order reference in transfer {event}");
            return Ok(ReconcileOutcome::Unmatched);
        };
        let order = self.db.fetch_order_by_matched_id(order_id).await.map_err(ReconciliationError::store)?;
        let Some(order) = order else {
            info!(target: UNMATCHED_LOG_TARGET, "🔄️💰️ Transfer {event} names order #{order_id}, which does not exist");
            return Ok(ReconcileOutcome::OrderNotFound(order_id));
        };
        if order.status != OrderStatusType::Pending {
            return Ok(self.terminal_outcome(&order, event));
        }
        let payment = PaymentFields {
            amount: event.amount,
            payment_provider: event.provider_id.clone(),
            payment_ref: event.external_txn_id.clone(),
            paid_at: event.received_at,
        };
        let result = self
            .db
            .compare_and_set_paid(order_id, OrderStatusType::Pending, payment)
            .await
            .map_err(ReconciliationError::store)?;
        match result {
            CompareAndSetResult::Updated(order) => Ok(self.on_applied(order, event)),
            CompareAndSetResult::Conflict(current) => {
                debug!("🔄️💰️ Order #{order_id} changed to {} while applying {event}", current.status);
                Ok(self.terminal_outcome(&current, event))
            },
            CompareAndSetResult::NotFound => {
                warn!("🔄️💰️ Order #{order_id} disappeared while applying {event}");
                Ok(ReconcileOutcome::OrderNotFound(order_id))
            },
        }
    }

    /// Fetches the current state of an order, for clients recovering from a missed notification.
    pub async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, ReconciliationError> {
        self.db.fetch_order_by_matched_id(id).await.map_err(ReconciliationError::store)
    }

    fn on_applied(&self, order: Order, event: &PaymentEvent) -> ReconcileOutcome {
        let discrepancy = AmountDiscrepancy::check(order.total_price, event.amount);
        match &discrepancy {
            Some(d) => warn!(
                "🔄️💰️ Order #{} was paid with {} but the order total is {} (difference {}). Transfer {event}",
                order.id,
                d.received,
                d.expected,
                d.difference()
            ),
            None => info!("🔄️💰️ Order #{} has been paid by transfer {event}", order.id),
        }
        self.producers.publish_payment_applied(PaymentAppliedEvent {
            order: order.clone(),
            amount: event.amount,
            provider_id: event.provider_id.clone(),
            external_txn_id: event.external_txn_id.clone(),
            discrepancy,
        });
        ReconcileOutcome::Applied { order, discrepancy }
    }

    fn terminal_outcome(&self, order: &Order, event: &PaymentEvent) -> ReconcileOutcome {
        match order.status {
            OrderStatusType::Cancelled => {
                warn!("🔄️💰️ Transfer {event} arrived for order #{}, which has already been cancelled", order.id);
                ReconcileOutcome::OrderCancelled { order_id: order.id }
            },
            _ => {
                let duplicate = order.is_paid_by(event.idempotency_key());
                if duplicate {
                    debug!("🔄️💰️ Transfer {event} has already been applied to order #{}", order.id);
                } else {
                    warn!(
                        "🔄️💰️ Order #{} is already paid by [{}:{}]. Transfer {event} is a second payment and needs \
                         operator attention",
                        order.id,
                        order.payment_provider.as_deref().unwrap_or_default(),
                        order.payment_ref.as_deref().unwrap_or_default()
                    );
                }
                ReconcileOutcome::AlreadyProcessed { order_id: order.id, duplicate }
            },
        }
    }
}
