use bank_payment_engine::{
    db_types::{Money, NewOrder, OrderId, OrderStatusType, PaymentEvent},
    ReconcileOutcome,
};
use chrono::{Duration, Utc};
use cucumber::{given, then, when};

use crate::cucumber::{bank_world::WaitingClient, BankWorld};

#[given(expr = "order {int} for {int} was placed {int} minutes ago")]
async fn order_placed_ago(world: &mut BankWorld, id: i64, total: i64, minutes: i64) {
    place_order(world, id, total, minutes).await;
}

#[given(expr = "order {int} for {int} is waiting for payment")]
async fn order_waiting(world: &mut BankWorld, id: i64, total: i64) {
    place_order(world, id, total, 0).await;
}

async fn place_order(world: &mut BankWorld, id: i64, total: i64, minutes: i64) {
    let created = Utc::now() - Duration::minutes(minutes);
    let order = NewOrder::new(OrderId::new(id), Money::from_major(total)).created_at(created);
    world.system().db.insert_order(order).await.expect("Error inserting order");
}

#[given(expr = "a client is waiting on order {int}")]
async fn client_waiting(world: &mut BankWorld, id: i64) {
    let hub = &world.system().hub;
    let connection = hub.connect();
    assert!(hub.subscribe(connection.id, &OrderId::new(id).topic()));
    world.client = Some(WaitingClient { connection, received: Vec::new() });
}

#[when(expr = "{word} reports transfer [{word}] of {int} with memo {string}")]
async fn transfer(world: &mut BankWorld, provider: String, txid: String, amount: i64, memo: String) {
    apply_transfer(world, &provider, &txid, amount, &memo).await;
}

#[when(expr = "{word} reports transfer [{word}] of {int} with memo {string} {int} times")]
async fn repeated_transfer(world: &mut BankWorld, provider: String, txid: String, amount: i64, memo: String, n: usize) {
    for _ in 0..n {
        apply_transfer(world, &provider, &txid, amount, &memo).await;
    }
}

async fn apply_transfer(world: &mut BankWorld, provider: &str, txid: &str, amount: i64, memo: &str) {
    let event = PaymentEvent::new(provider, txid, Money::from_major(amount), memo);
    let outcome = world.api().apply_payment(&event).await.expect("Error applying payment");
    world.outcomes.push(outcome);
}

#[when(expr = "the reaper sweeps orders older than {int} minutes")]
async fn reaper_sweeps(world: &mut BankWorld, ttl: i64) {
    let result = world.system().expiry.expire_stale_orders(Duration::minutes(ttl)).await.expect("Error sweeping");
    world.last_sweep = Some(result);
}

#[then(expr = "order {int} is {word}")]
async fn order_status(world: &mut BankWorld, id: i64, status: String) {
    let expected = status.parse::<OrderStatusType>().expect("Unknown order status");
    let order = world.api().fetch_order(OrderId::new(id)).await.expect("Error fetching order").expect("No such order");
    assert_eq!(order.status, expected);
}

#[then(expr = "order {int} was paid {int} by [{word}]")]
async fn order_paid_with(world: &mut BankWorld, id: i64, amount: i64, txid: String) {
    let order = world.api().fetch_order(OrderId::new(id)).await.expect("Error fetching order").expect("No such order");
    assert_eq!(order.payment_amount, Some(Money::from_major(amount)));
    assert_eq!(order.payment_ref, Some(txid));
    assert!(order.paid_at.is_some());
}

#[then(expr = "order {int} has no payment recorded")]
async fn order_unpaid(world: &mut BankWorld, id: i64) {
    let order = world.api().fetch_order(OrderId::new(id)).await.expect("Error fetching order").expect("No such order");
    assert!(order.paid_at.is_none());
    assert!(order.payment_amount.is_none());
    assert!(order.payment_ref.is_none());
}

#[then(expr = "the outcomes are {string}")]
async fn outcomes_are(world: &mut BankWorld, expected: String) {
    let actual = world.outcomes.iter().map(ReconcileOutcome::to_string).collect::<Vec<_>>().join(", ");
    assert_eq!(actual, expected);
}

#[then(expr = "the last payment was {int} short of the order total")]
async fn short_payment(world: &mut BankWorld, shortfall: i64) {
    let Some(ReconcileOutcome::Applied { discrepancy: Some(d), .. }) = world.outcomes.last() else {
        panic!("Last outcome is not an applied payment with a discrepancy: {:?}", world.outcomes.last());
    };
    assert_eq!(d.difference(), Money::from_major(-shortfall));
}

#[then(expr = "the reaper cancelled {int} and skipped {int} orders")]
async fn sweep_result(world: &mut BankWorld, cancelled: usize, skipped: usize) {
    let sweep = world.last_sweep.as_ref().expect("The reaper has not run");
    assert_eq!(sweep.cancelled.len(), cancelled);
    assert_eq!(sweep.skipped.len(), skipped);
}

#[then(expr = "the client receives {int} {word} message(s) for order-{int}")]
async fn client_receives(world: &mut BankWorld, count: usize, status: String, id: i64) {
    let expected = status.parse::<OrderStatusType>().expect("Unknown order status");
    let client = world.client.as_mut().expect("No client is waiting");
    client.drain().await;
    let topic = OrderId::new(id).topic();
    let matching = client.received.iter().filter(|m| m.status == expected && m.order_ref == topic).count();
    assert_eq!(matching, count, "Received: {:?}", client.received);
}
