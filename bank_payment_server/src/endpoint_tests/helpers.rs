use std::{future::poll_fn, time::Duration as StdDuration};

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::ServiceResponse,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    App,
};
use bank_payment_engine::{
    db_types::{Money, NewOrder, Order, OrderId},
    events::{EventHandlers, EventProducers, NotificationHub, OrderPush},
    MemoryOrderStore,
    OrderStore,
    ReconciliationApi,
};
use bpg_common::Secret;

use crate::{
    config::{ProviderSecrets, WebhookOptions},
    providers::WebhookIngress,
    server::{notification_hooks, routes},
};

pub const SEPAY_KEY: &str = "sepay-test-key";
pub const CASSO_TOKEN: &str = "casso-test-token";

/// A fully wired application backed by the in-memory store. Every request builds a fresh service over the same store
/// and hub, so state carries over between requests.
pub struct TestContext {
    pub store: MemoryOrderStore,
    pub hub: NotificationHub<OrderPush>,
    pub options: WebhookOptions,
    producers: EventProducers,
}

impl TestContext {
    /// Must be called from within a runtime, since it starts the notification handlers.
    pub fn new() -> Self {
        let _ = env_logger::try_init();
        let hub = NotificationHub::<OrderPush>::new(16);
        let handlers = EventHandlers::new(16, notification_hooks(&hub));
        let producers = handlers.producers();
        handlers.start_handlers();
        Self { store: MemoryOrderStore::new(), hub, options: WebhookOptions::default(), producers }
    }

    pub fn producers(&self) -> EventProducers {
        self.producers.clone()
    }

    pub fn with_store_timeout(mut self, timeout: StdDuration) -> Self {
        self.options.store_timeout = timeout;
        self
    }

    pub fn add_order(&self, id: i64, total: i64) -> Order {
        self.store.insert_order(NewOrder::new(OrderId::new(id), Money::from_major(total))).unwrap()
    }

    pub async fn order(&self, id: i64) -> Order {
        self.store.fetch_order_by_matched_id(OrderId::new(id)).await.unwrap().expect("Order does not exist")
    }

    pub async fn send(&self, req: TestRequest) -> ServiceResponse {
        let secrets = ProviderSecrets {
            sepay_api_key: Secret::new(SEPAY_KEY.to_string()),
            casso_webhook_token: Secret::new(CASSO_TOKEN.to_string()),
        };
        let api = ReconciliationApi::new(self.store.clone(), self.producers.clone());
        let app = App::new()
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(WebhookIngress::new(secrets)))
            .app_data(web::Data::new(self.hub.clone()))
            .app_data(web::Data::new(self.options))
            .configure(routes::<MemoryOrderStore>);
        let service = test::init_service(app).await;
        test::call_service(&service, req.to_request()).await
    }

    pub async fn send_text(&self, req: TestRequest) -> (StatusCode, String) {
        let res = self.send(req).await;
        let status = res.status();
        let body = test::read_body(res).await;
        (status, String::from_utf8_lossy(&body).into_owned())
    }
}

pub fn sepay_request(body: &str) -> TestRequest {
    TestRequest::post()
        .uri("/webhook/sepay")
        .insert_header(("Authorization", format!("Apikey {SEPAY_KEY}")))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string())
}

pub fn casso_request(body: &str) -> TestRequest {
    TestRequest::post()
        .uri("/webhook/casso")
        .insert_header(("X-Webhook-Token", CASSO_TOKEN))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string())
}

pub fn sepay_transfer(id: i64, amount: i64, content: &str) -> String {
    serde_json::json!({
        "id": id,
        "gateway": "Vietcombank",
        "transactionDate": "2024-10-16 14:02:37",
        "accountNumber": "0123499999",
        "content": content,
        "transferType": "in",
        "transferAmount": amount,
        "referenceCode": "MBVCB.3278907687",
    })
    .to_string()
}

pub fn casso_transfer(id: i64, amount: i64, description: &str) -> String {
    serde_json::json!({
        "error": 0,
        "data": [{ "id": id, "tid": format!("FT{id}"), "description": description, "amount": amount }],
    })
    .to_string()
}

/// Waits for the next frame of a streaming body.
pub async fn next_frame(body: &mut std::pin::Pin<Box<BoxBody>>) -> Option<String> {
    let frame = tokio::time::timeout(StdDuration::from_secs(2), poll_fn(|cx| body.as_mut().poll_next(cx)))
        .await
        .expect("Timed out waiting for an SSE frame")?;
    let bytes = frame.expect("Body error");
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
