use actix_web::{http::StatusCode, test::TestRequest};
use bank_payment_engine::{db_types::OrderId, ExpiryApi};
use chrono::Duration;

use super::helpers::{casso_request, casso_transfer, next_frame, sepay_request, sepay_transfer, TestContext};

fn connection_id(frame: &str) -> u64 {
    let data = frame.lines().find_map(|l| l.strip_prefix("data: ")).expect("No data line");
    let json: serde_json::Value = serde_json::from_str(data).unwrap();
    json["connectionId"].as_u64().unwrap()
}

#[actix_web::test]
async fn waiting_client_sees_payment() {
    let ctx = TestContext::new();
    ctx.add_order(45, 500_000);
    let res = ctx.send(TestRequest::get().uri("/realtime/orders?orderId=45")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get("content-type").unwrap(), "text/event-stream");
    let mut body = Box::pin(res.into_body());
    let hello = next_frame(&mut body).await.unwrap();
    assert!(hello.starts_with("event: connected\n"), "{hello}");
    assert_eq!(ctx.hub.subscriber_count("order-45"), 1);

    let (status, _) = ctx.send_text(sepay_request(&sepay_transfer(92704, 500_000, "DH45-NGUYEN"))).await;
    assert_eq!(status, StatusCode::OK);
    let push = next_frame(&mut body).await.unwrap();
    assert_eq!(push, "event: order\ndata: {\"orderRef\":\"order-45\",\"amount\":500000,\"status\":\"Paid\"}\n\n");
}

/// The store commits the payment but replies after the webhook has given up. The provider gets a 503, yet the waiting
/// client is still told, and the retry is recognised as a redelivery.
#[actix_web::test]
async fn committed_payment_is_pushed_after_a_timeout() {
    let ctx = TestContext::new().with_store_timeout(std::time::Duration::from_millis(20));
    ctx.add_order(45, 500_000);
    let mut body = Box::pin(ctx.send(TestRequest::get().uri("/realtime/orders?orderId=45")).await.into_body());
    let _ = next_frame(&mut body).await;
    ctx.store.set_ack_latency(std::time::Duration::from_millis(300));
    let payload = sepay_transfer(92704, 500_000, "DH45-NGUYEN");
    let (status, _) = ctx.send_text(sepay_request(&payload)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let push = next_frame(&mut body).await.unwrap();
    assert!(push.contains("\"status\":\"Paid\""), "{push}");
    ctx.store.set_ack_latency(std::time::Duration::ZERO);
    let (status, text) = ctx.send_text(sepay_request(&payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("\"outcome\":\"duplicate\""), "{text}");
}

#[actix_web::test]
async fn redelivery_does_not_push_twice() {
    let ctx = TestContext::new();
    ctx.add_order(45, 500_000);
    let mut body = Box::pin(ctx.send(TestRequest::get().uri("/realtime/orders?orderId=45")).await.into_body());
    let _ = next_frame(&mut body).await;
    let payload = casso_transfer(12345, 500_000, "DH45");
    for _ in 0..3 {
        let (status, _) = ctx.send_text(casso_request(&payload)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let push = next_frame(&mut body).await.unwrap();
    assert!(push.contains("\"status\":\"Paid\""));
    let extra = tokio::time::timeout(
        std::time::Duration::from_millis(100),
        std::future::poll_fn(|cx| actix_web::body::MessageBody::poll_next(body.as_mut(), cx)),
    )
    .await;
    assert!(extra.is_err(), "Unexpected second push");
}

#[actix_web::test]
async fn join_and_leave_topics() {
    let ctx = TestContext::new();
    ctx.add_order(7, 100);
    ctx.add_order(8, 100);
    let mut body = Box::pin(ctx.send(TestRequest::get().uri("/realtime/orders")).await.into_body());
    let id = connection_id(&next_frame(&mut body).await.unwrap());

    let (status, _) = ctx.send_text(TestRequest::post().uri(&format!("/realtime/connections/{id}/orders/7"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ctx.send_text(TestRequest::post().uri(&format!("/realtime/connections/{id}/orders/8"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body_text) =
        ctx.send_text(TestRequest::delete().uri(&format!("/realtime/connections/{id}/orders/7"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_text, r#"{"success":true,"message":"Unsubscribed from order-7"}"#);
    assert_eq!(ctx.hub.subscriber_count("order-7"), 0);

    let (status, _) = ctx.send_text(sepay_request(&sepay_transfer(1, 100, "DH7"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ctx.send_text(sepay_request(&sepay_transfer(2, 100, "DH8"))).await;
    assert_eq!(status, StatusCode::OK);
    let push = next_frame(&mut body).await.unwrap();
    assert!(push.contains("\"orderRef\":\"order-8\""), "{push}");
}

#[actix_web::test]
async fn unknown_connection() {
    let ctx = TestContext::new();
    let (status, _) = ctx.send_text(TestRequest::post().uri("/realtime/connections/9999/orders/1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = ctx.send_text(TestRequest::delete().uri("/realtime/connections/abc/orders/1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn closing_the_stream_disconnects() {
    let ctx = TestContext::new();
    let body = Box::pin(ctx.send(TestRequest::get().uri("/realtime/orders?orderId=3")).await.into_body());
    assert_eq!(ctx.hub.connection_count(), 1);
    drop(body);
    assert_eq!(ctx.hub.connection_count(), 0);
    assert_eq!(ctx.hub.subscriber_count(&OrderId::new(3).topic()), 0);
}

#[actix_web::test]
async fn waiting_client_sees_expiry() {
    let ctx = TestContext::new();
    let order = ctx.add_order(9, 100);
    let mut body = Box::pin(ctx.send(TestRequest::get().uri("/realtime/orders?orderId=9")).await.into_body());
    let _ = next_frame(&mut body).await;
    let expiry = ExpiryApi::new(ctx.store.clone(), ctx.producers());
    let result = expiry.expire_orders_created_before(order.created_at + Duration::seconds(1)).await.unwrap();
    assert_eq!(result.cancelled.len(), 1);
    let push = next_frame(&mut body).await.unwrap();
    assert!(push.contains("\"status\":\"Cancelled\""), "{push}");
}
