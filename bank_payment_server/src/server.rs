use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use bank_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers, NotificationHub, OrderPush},
    helpers::MemoMatcher,
    OrderStore,
    ReconciliationApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::{ServerConfig, WebhookOptions},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    providers::WebhookIngress,
    routes::{health, join_order, leave_order, realtime_orders, OrderStatusRoute, WebhookRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let hub = NotificationHub::<OrderPush>::new(config.event_buffer_size);
    let handlers = EventHandlers::new(config.event_buffer_size, notification_hooks(&hub));
    let producers = handlers.producers();
    handlers.start_handlers();
    // The reaper only needs a clone of the pool handle
    let _reaper =
        start_expiry_worker(db.clone(), producers.clone(), config.unpaid_order_ttl, config.reaper_interval);
    let srv = create_server_instance(config, db, hub, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Forwards order payments and expiries to every client waiting on that order.
pub fn notification_hooks(hub: &NotificationHub<OrderPush>) -> EventHooks {
    let mut hooks = EventHooks::default();
    let paid_hub = hub.clone();
    hooks.on_payment_applied(move |ev| {
        let hub = paid_hub.clone();
        Box::pin(async move {
            let topic = ev.order.id.topic();
            let n = hub.publish(&topic, OrderPush::from(&ev));
            debug!("📡️ Payment for {topic} pushed to {n} waiting clients");
        })
    });
    let expired_hub = hub.clone();
    hooks.on_order_expired(move |ev| {
        let hub = expired_hub.clone();
        Box::pin(async move {
            let topic = ev.order.id.topic();
            let n = hub.publish(&topic, OrderPush::from(&ev));
            debug!("📡️ Expiry of {topic} pushed to {n} waiting clients");
        })
    });
    hooks
}

pub fn create_server_instance<B: OrderStore>(
    config: ServerConfig,
    db: B,
    hub: NotificationHub<OrderPush>,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let ingress = WebhookIngress::new(config.providers.clone());
    let matcher = MemoMatcher::new(&config.memo_marker);
    let options = WebhookOptions::from_config(&config);
    let srv = HttpServer::new(move || {
        let api = ReconciliationApi::new(db.clone(), producers.clone()).with_matcher(matcher.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("bpg::access_log"))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(ingress.clone()))
            .app_data(web::Data::new(hub.clone()))
            .app_data(web::Data::new(options))
            .configure(routes::<B>)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("🚀️ Listening on {}:{}", config.host, config.port);
    Ok(srv)
}

/// Registers every route. The application data it relies on is `ReconciliationApi<B>`, [`WebhookIngress`],
/// `NotificationHub<OrderPush>` and [`WebhookOptions`].
pub fn routes<B: OrderStore>(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(WebhookRoute::<B>::new())
        .service(OrderStatusRoute::<B>::new())
        .service(realtime_orders)
        .service(join_order)
        .service(leave_order);
}
