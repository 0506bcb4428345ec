use std::time::Duration as StdDuration;

use actix_web::{http::StatusCode, test::TestRequest};
use bank_payment_engine::{
    db_types::{Money, OrderId, OrderStatusType},
    OrderStore,
};
use serde_json::Value;

use super::helpers::{casso_request, casso_transfer, sepay_request, sepay_transfer, TestContext, CASSO_TOKEN};

fn outcomes(body: &str) -> Vec<String> {
    let json: Value = serde_json::from_str(body).expect("Response is not JSON");
    json["results"]
        .as_array()
        .expect("No results")
        .iter()
        .map(|r| r["outcome"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[actix_web::test]
async fn sepay_transfer_pays_matching_order() {
    let ctx = TestContext::new();
    ctx.add_order(45, 500_000);
    let (status, body) = ctx.send_text(sepay_request(&sepay_transfer(92704, 500_000, "chuyen tien DH45-NGUYEN"))).await;
    assert_eq!(status, StatusCode::OK);
    let expected = concat!(
        r#"{"success":true,"message":"1 transfers received, 1 applied","#,
        r#""results":[{"externalTxnId":"92704","outcome":"applied","orderRef":"order-45"}]}"#
    );
    assert_eq!(body, expected);
    let order = ctx.order(45).await;
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.payment_amount, Some(Money::from_major(500_000)));
    assert_eq!(order.payment_ref.as_deref(), Some("92704"));
}

#[actix_web::test]
async fn redelivered_transfer_is_applied_once() {
    let ctx = TestContext::new();
    ctx.add_order(45, 500_000);
    let payload = casso_transfer(12345, 500_000, "DH45-NGUYEN");
    let (status, body) = ctx.send_text(casso_request(&payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcomes(&body), vec!["applied"]);
    let paid_at = ctx.order(45).await.paid_at;
    assert!(paid_at.is_some());
    for _ in 0..2 {
        let (status, body) = ctx.send_text(casso_request(&payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcomes(&body), vec!["duplicate"]);
    }
    assert_eq!(ctx.order(45).await.paid_at, paid_at);
}

#[actix_web::test]
async fn reused_txn_id_from_another_provider_is_not_a_redelivery() {
    let ctx = TestContext::new();
    ctx.add_order(45, 500_000);
    let (status, body) = ctx.send_text(casso_request(&casso_transfer(12345, 500_000, "DH45-NGUYEN"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcomes(&body), vec!["applied"]);
    let (status, body) = ctx.send_text(sepay_request(&sepay_transfer(12345, 500_000, "thanh toan DH45"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcomes(&body), vec!["already_paid"]);
    let order = ctx.order(45).await;
    assert_eq!(order.payment_provider.as_deref(), Some("casso"));
    assert_eq!(order.payment_ref.as_deref(), Some("12345"));
}

#[actix_web::test]
async fn unmatched_memo_is_acknowledged() {
    let ctx = TestContext::new();
    ctx.add_order(45, 500_000);
    let (status, body) = ctx.send_text(sepay_request(&sepay_transfer(1, 500_000, "tien nha thang 10"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcomes(&body), vec!["unmatched"]);
    assert_eq!(ctx.order(45).await.status, OrderStatusType::Pending);
}

#[actix_web::test]
async fn unknown_order_is_acknowledged() {
    let ctx = TestContext::new();
    let (status, body) = ctx.send_text(sepay_request(&sepay_transfer(2, 100, "DH999"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""outcome":"order_not_found","orderRef":"order-999""#), "{body}");
}

#[actix_web::test]
async fn cancelled_order_is_not_paid() {
    let ctx = TestContext::new();
    ctx.add_order(7, 100);
    ctx.store.compare_and_set_cancelled(OrderId::new(7), OrderStatusType::Pending).await.unwrap();
    let (status, body) = ctx.send_text(casso_request(&casso_transfer(3, 100, "DH7"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcomes(&body), vec!["order_cancelled"]);
    let order = ctx.order(7).await;
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert!(order.paid_at.is_none());
}

#[actix_web::test]
async fn casso_batch_reports_each_transfer() {
    let ctx = TestContext::new();
    ctx.add_order(1, 100);
    ctx.add_order(2, 200);
    let payload = r#"{"error": 0, "data": [
        {"id": 11, "description": "DH1", "amount": 100},
        {"id": 12, "description": "rut tien", "amount": -50},
        {"id": 13, "description": "DH2 thieu", "amount": 150}
    ]}"#;
    let (status, body) = ctx.send_text(casso_request(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcomes(&body), vec!["applied", "applied"]);
    let underpaid = ctx.order(2).await;
    assert_eq!(underpaid.status, OrderStatusType::Paid);
    assert_eq!(underpaid.payment_amount, Some(Money::from_major(150)));
}

#[actix_web::test]
async fn bad_credentials_are_rejected() {
    let ctx = TestContext::new();
    ctx.add_order(45, 500_000);
    let payload = sepay_transfer(1, 500_000, "DH45");
    let wrong_key = sepay_request(&payload).insert_header(("Authorization", "Apikey not-the-key"));
    let (status, body) = ctx.send_text(wrong_key).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!body.contains("not-the-key"));
    let missing = TestRequest::post().uri("/webhook/casso").set_payload(casso_transfer(1, 500_000, "DH45"));
    let (status, _) = ctx.send_text(missing).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.order(45).await.status, OrderStatusType::Pending);
}

#[actix_web::test]
async fn credentials_are_checked_before_the_body() {
    let ctx = TestContext::new();
    let req = TestRequest::post().uri("/webhook/casso").set_payload("this is not json");
    let (status, _) = ctx.send_text(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let req = TestRequest::post()
        .uri("/webhook/casso")
        .insert_header(("X-Webhook-Token", CASSO_TOKEN))
        .set_payload("this is not json");
    let (status, body) = ctx.send_text(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"error":"#), "{body}");
}

#[actix_web::test]
async fn unknown_provider() {
    let ctx = TestContext::new();
    let req = TestRequest::post().uri("/webhook/paypal").set_payload("{}");
    let (status, body) = ctx.send_text(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"Unknown payment provider: paypal"}"#);
}

#[actix_web::test]
async fn store_outage_asks_for_redelivery() {
    let ctx = TestContext::new();
    ctx.add_order(45, 500_000);
    ctx.store.set_unavailable(true);
    let payload = sepay_transfer(5, 500_000, "DH45");
    let (status, _) = ctx.send_text(sepay_request(&payload)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    ctx.store.set_unavailable(false);
    let (status, body) = ctx.send_text(sepay_request(&payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcomes(&body), vec!["applied"]);
}

#[actix_web::test]
async fn slow_store_times_out() {
    let ctx = TestContext::new().with_store_timeout(StdDuration::from_millis(20));
    ctx.add_order(45, 500_000);
    ctx.store.set_latency(StdDuration::from_millis(500));
    let (status, body) = ctx.send_text(sepay_request(&sepay_transfer(6, 500_000, "DH45"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, r#"{"error":"The order store did not respond in time"}"#);
    ctx.store.set_latency(StdDuration::ZERO);
    assert_eq!(ctx.order(45).await.status, OrderStatusType::Pending);
    // The abandoned reconciliation still runs to completion in the background
    tokio::time::sleep(StdDuration::from_millis(700)).await;
    assert_eq!(ctx.order(45).await.status, OrderStatusType::Paid);
}
