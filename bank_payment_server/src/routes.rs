//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every store access below is awaited, and bounded by the configured
//! store timeout, so a slow store never pins a worker.
use std::{future::Future, str::FromStr};

use actix_web::{delete, get, http::header, post, web, HttpRequest, HttpResponse, Responder};
use bank_payment_engine::{
    db_types::{OrderId, PaymentEvent},
    events::{ConnectionId, NotificationHub, OrderPush},
    OrderStore,
    ReconcileOutcome,
    ReconciliationApi,
};
use log::*;

use crate::{
    config::WebhookOptions,
    data_objects::{JsonResponse, OrderView, RealtimeQuery, TransferResult, WebhookResponse},
    errors::ServerError,
    providers::{IngressError, ProviderId, WebhookIngress},
    realtime::{sse_stream, SSE_KEEP_ALIVE},
};

/// Raw bodies of webhook calls that could not be parsed are logged to this target, and only to this target.
pub const REJECTED_PAYLOADS_LOG_TARGET: &str = "bpg::rejected_payloads";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

//----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(webhook => Post "/webhook/{provider}" impl OrderStore);
/// Receives a bank transfer notification from a payment provider.
///
/// The provider credential is checked before the body is looked at. Every transfer in the payload is then reconciled
/// in order. The response lists the outcome of each transfer. Unmatched transfers and transfers for unknown orders are
/// still a 200, since retrying them would not change the result. If the store fails or times out on any transfer, the
/// whole call fails with a 503 so that the provider retries it; transfers that were already applied are recognised as
/// duplicates on the retry.
///
/// Each transfer is reconciled on its own task. A timeout only abandons the wait, so a write that the store has already
/// committed still gets its payment event published.
pub async fn webhook<B: OrderStore>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    ingress: web::Data<WebhookIngress>,
    api: web::Data<ReconciliationApi<B>>,
    options: web::Data<WebhookOptions>,
) -> Result<HttpResponse, ServerError> {
    let name = path.into_inner();
    let provider = ProviderId::from_str(&name).map_err(|_| {
        debug!("💻️ Webhook call for unknown provider '{name}'");
        ServerError::UnknownProvider(name.clone())
    })?;
    trace!("💻️ Received {provider} webhook call ({} bytes)", body.len());
    let events = ingress.receive(provider, &body, req.headers()).map_err(|e| {
        match &e {
            IngressError::Auth(err) => warn!("💻️ Rejected {provider} webhook call. {err}"),
            IngressError::Parse(err) => {
                warn!("💻️ Could not parse {provider} webhook payload. {err}");
                info!(
                    target: REJECTED_PAYLOADS_LOG_TARGET,
                    "{provider} payload rejected ({err}): {}",
                    String::from_utf8_lossy(&body)
                );
            },
        }
        ServerError::from(e)
    })?;
    let mut results = Vec::with_capacity(events.len());
    for event in &events {
        let outcome = apply_detached(api.get_ref(), event, options.store_timeout).await?;
        info!("💻️ {event} => {outcome}");
        results.push(TransferResult::new(event, &outcome));
    }
    Ok(HttpResponse::Ok().json(WebhookResponse::new(results)))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_status => Get "/orders/{order_id}" impl OrderStore);
pub async fn order_status<B: OrderStore>(
    path: web::Path<OrderId>,
    api: web::Data<ReconciliationApi<B>>,
    options: web::Data<WebhookOptions>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let order = with_store_timeout(options.store_timeout, api.fetch_order(id))
        .await??
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order #{id}")))?;
    Ok(HttpResponse::Ok().json(OrderView::from(order)))
}

//----------------------------------------------   Realtime  ----------------------------------------------------
/// Opens a Server-Sent Events stream. When `orderId` is given, the new connection is subscribed to that order's topic
/// straight away.
#[get("/realtime/orders")]
pub async fn realtime_orders(
    query: web::Query<RealtimeQuery>,
    hub: web::Data<NotificationHub<OrderPush>>,
) -> HttpResponse {
    let connection = hub.connect();
    if let Some(id) = query.order_id {
        hub.subscribe(connection.id, &OrderId::new(id).topic());
    }
    debug!("📡️ SSE connection {} opened (order: {:?})", connection.id, query.order_id);
    let hub = hub.get_ref().clone();
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(sse_stream(hub, connection, SSE_KEEP_ALIVE))
}

#[post("/realtime/connections/{connection_id}/orders/{order_id}")]
pub async fn join_order(
    path: web::Path<(String, OrderId)>,
    hub: web::Data<NotificationHub<OrderPush>>,
) -> Result<HttpResponse, ServerError> {
    let (connection_id, order_id) = path.into_inner();
    let connection_id = live_connection(&hub, &connection_id)?;
    let topic = order_id.topic();
    hub.subscribe(connection_id, &topic);
    debug!("📡️ Connection {connection_id} joined {topic}");
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Subscribed to {topic}"))))
}

#[delete("/realtime/connections/{connection_id}/orders/{order_id}")]
pub async fn leave_order(
    path: web::Path<(String, OrderId)>,
    hub: web::Data<NotificationHub<OrderPush>>,
) -> Result<HttpResponse, ServerError> {
    let (connection_id, order_id) = path.into_inner();
    let connection_id = live_connection(&hub, &connection_id)?;
    let topic = order_id.topic();
    let message = if hub.unsubscribe(connection_id, &topic) {
        format!("Unsubscribed from {topic}")
    } else {
        format!("Not subscribed to {topic}")
    };
    debug!("📡️ Connection {connection_id} left {topic}");
    Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
}

fn live_connection(hub: &NotificationHub<OrderPush>, id: &str) -> Result<ConnectionId, ServerError> {
    ConnectionId::from_str(id)
        .ok()
        .filter(|id| hub.is_connected(*id))
        .ok_or_else(|| ServerError::NoRecordFound(format!("Connection {id}")))
}

async fn apply_detached<B: OrderStore>(
    api: &ReconciliationApi<B>,
    event: &PaymentEvent,
    limit: std::time::Duration,
) -> Result<ReconcileOutcome, ServerError> {
    let api = api.clone();
    let event = event.clone();
    let task = tokio::spawn(async move { api.apply_payment(&event).await });
    let outcome = with_store_timeout(limit, task).await?.map_err(|e| {
        error!("💻️ Payment reconciliation task failed. {e}");
        ServerError::Unspecified(e.to_string())
    })??;
    Ok(outcome)
}

async fn with_store_timeout<F, T>(limit: std::time::Duration, fut: F) -> Result<T, ServerError>
where F: Future<Output = T> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        warn!("💻️ Order store did not respond within {}ms", limit.as_millis());
        ServerError::StoreTimeout
    })
}
