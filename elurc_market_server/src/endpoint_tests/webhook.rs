use actix_web::{http::StatusCode, test::TestRequest};
use elurc_market_engine::{
    db_types::{Order, OrderStatusType, Product},
    test_utils::prepare_env::{drop_test_db, new_test_db, order_request, seed_catalog},
    SqliteDatabase,
};
use serde_json::Value;

use super::helpers::{call_market, payment_body, signed_webhook, test_config};
use crate::{config::ServerConfig, middleware::HMAC_HEADER};

/// Places an order for two bags of apples (4 ELURC) through the checkout endpoint.
async fn place_order(db: &SqliteDatabase, config: &ServerConfig, products: &[Product]) -> Order {
    let body = serde_json::to_string(&order_request(&[(&products[0], 2)])).unwrap();
    let req = TestRequest::post()
        .uri("/order")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body);
    let (status, body) = call_market(db, config, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    serde_json::from_str(&body).unwrap()
}

fn result_of(body: &str) -> (String, Order) {
    let v: Value = serde_json::from_str(body).unwrap();
    let result = v["result"].as_str().unwrap().to_string();
    (result, serde_json::from_value(v["order"].clone()).unwrap())
}

#[actix_web::test]
async fn payment_marks_order_paid() {
    let db = new_test_db().await;
    let products = seed_catalog(&db).await;
    let config = test_config();
    let order = place_order(&db, &config, &products).await;
    assert_eq!(order.status, OrderStatusType::Pending);

    let body = payment_body(order.id.as_str(), "5xTxSig1", 4_000_000);
    let (status, res) = call_market(&db, &config, signed_webhook(&body)).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    let (result, paid) = result_of(&res);
    assert_eq!(result, "paid");
    assert_eq!(paid.status, OrderStatusType::Paid);
    assert_eq!(paid.transaction_signature.as_deref(), Some("5xTxSig1"));
    assert!(paid.paid_at.is_some());

    // The verifier retries are harmless
    let (status, res) = call_market(&db, &config, signed_webhook(&body)).await;
    assert_eq!(status, StatusCode::OK);
    let (result, _) = result_of(&res);
    assert_eq!(result, "already_recorded");
    drop_test_db(db).await;
}

#[actix_web::test]
async fn unsigned_payment_is_rejected() {
    let db = new_test_db().await;
    let products = seed_catalog(&db).await;
    let config = test_config();
    let order = place_order(&db, &config, &products).await;

    let body = payment_body(order.id.as_str(), "5xTxSig2", 4_000_000);
    let req = TestRequest::post()
        .uri("/webhook/payment_confirmed")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.clone());
    let (status, res) = call_market(&db, &config, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(res, r#"{"error":"Authentication Error. Request signature is invalid. No HMAC signature found."}"#);

    // Signed for a different amount
    let forged = payment_body(order.id.as_str(), "5xTxSig2", 40_000_000);
    let req = signed_webhook(&body).set_payload(forged);
    let (status, _) = call_market(&db, &config, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = signed_webhook(&body).insert_header((HMAC_HEADER, "bm90IGEgc2lnbmF0dXJl"));
    let (status, _) = call_market(&db, &config, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, res) = call_market(&db, &config, TestRequest::get().uri(&format!("/order/{}", order.id))).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&res).unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert!(order.transaction_signature.is_none());
    drop_test_db(db).await;
}

#[actix_web::test]
async fn hmac_checks_can_be_disabled() {
    let db = new_test_db().await;
    let products = seed_catalog(&db).await;
    let mut config = test_config();
    config.webhook.hmac_checks = false;
    let order = place_order(&db, &config, &products).await;

    let req = TestRequest::post()
        .uri("/webhook/payment_confirmed")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(payment_body(order.id.as_str(), "5xTxSig3", 4_000_000));
    let (status, res) = call_market(&db, &config, req).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    drop_test_db(db).await;
}

#[actix_web::test]
async fn verifier_whitelist() {
    let db = new_test_db().await;
    let products = seed_catalog(&db).await;
    let mut config = test_config();
    config.webhook.whitelist = Some(vec!["10.0.0.7".parse().unwrap()]);
    let order = place_order(&db, &config, &products).await;
    let body = payment_body(order.id.as_str(), "5xTxSig4", 4_000_000);

    let req = signed_webhook(&body).peer_addr("192.168.1.20:40000".parse().unwrap());
    let (status, res) = call_market(&db, &config, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(res, r#"{"error":"Authentication Error. Requests from this address are not allowed."}"#);

    let req = signed_webhook(&body).peer_addr("10.0.0.7:40000".parse().unwrap());
    let (status, res) = call_market(&db, &config, req).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    drop_test_db(db).await;
}

#[actix_web::test]
async fn underpayment_is_held_for_review() {
    let db = new_test_db().await;
    let products = seed_catalog(&db).await;
    let config = test_config();
    let order = place_order(&db, &config, &products).await;

    let body = payment_body(order.id.as_str(), "5xTxSig5", 3_500_000);
    let (status, res) = call_market(&db, &config, signed_webhook(&body)).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    let (result, held) = result_of(&res);
    assert_eq!(result, "held_for_review");
    assert_eq!(held.status, OrderStatusType::Pending);
    assert!(held.is_awaiting_review());
    assert_eq!(held.payment_discrepancy.difference_amount.value(), 500_000);
    drop_test_db(db).await;
}

#[actix_web::test]
async fn bad_payment_reports() {
    let db = new_test_db().await;
    let products = seed_catalog(&db).await;
    let config = test_config();
    let first = place_order(&db, &config, &products).await;
    let second = place_order(&db, &config, &products).await;

    let body = payment_body("no-such-order", "5xTxSig6", 4_000_000);
    let (status, _) = call_market(&db, &config, signed_webhook(&body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body = payment_body(first.id.as_str(), "5xTxSig6", 0);
    let (status, _) = call_market(&db, &config, signed_webhook(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = payment_body(first.id.as_str(), "5xTxSig6", 4_000_000);
    let (status, _) = call_market(&db, &config, signed_webhook(&body)).await;
    assert_eq!(status, StatusCode::OK);

    // One transaction cannot pay for two orders
    let body = payment_body(second.id.as_str(), "5xTxSig6", 4_000_000);
    let (status, _) = call_market(&db, &config, signed_webhook(&body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A second transaction for an order that is already paid
    let body = payment_body(first.id.as_str(), "5xTxSig7", 4_000_000);
    let (status, _) = call_market(&db, &config, signed_webhook(&body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    drop_test_db(db).await;
}
