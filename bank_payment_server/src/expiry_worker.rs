use std::time::Duration as StdDuration;

use bank_payment_engine::{db_types::OrderId, events::EventProducers, ExpiryApi, OrderStore};
use chrono::Duration;
use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Starts the stale order reaper. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, orders that have been `Pending` for at least `ttl` are cancelled. A sweep that fails outright is
/// logged and retried on the next tick. Sweeps never overlap; if one runs long, the next tick is delayed rather than
/// fired in a burst.
pub fn start_expiry_worker<B>(db: B, producers: EventProducers, ttl: Duration, interval: StdDuration) -> JoinHandle<()>
where B: OrderStore + 'static {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let api = ExpiryApi::new(db, producers);
        info!(
            "🕰️ Unpaid order expiry worker started. TTL: {}min, sweep interval: {}s",
            ttl.num_minutes(),
            interval.as_secs()
        );
        loop {
            timer.tick().await;
            trace!("🕰️ Running unpaid order expiry job");
            match api.expire_stale_orders(ttl).await {
                Ok(result) if result.is_empty() => trace!("🕰️ No stale orders"),
                Ok(result) => {
                    info!("🕰️ {} orders expired", result.cancelled.len());
                    debug!("🕰️ Expired orders: {}", order_list(result.cancelled.iter().map(|o| &o.id)));
                    if !result.skipped.is_empty() {
                        debug!("🕰️ Skipped (status changed): {}", order_list(result.skipped.iter()));
                    }
                    if !result.failed.is_empty() {
                        warn!("🕰️ Could not expire {}. Will retry next sweep", order_list(result.failed.iter()));
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running unpaid order expiry job: {e}");
                },
            }
        }
    })
}

fn order_list<'a, I: Iterator<Item = &'a OrderId>>(ids: I) -> String {
    ids.map(|id| format!("#{id}")).collect::<Vec<String>>().join(", ")
}
