use actix_web::{http::StatusCode, test::TestRequest};
use elurc_market_engine::{
    db_types::{DiscrepancyResolution, Order, OrderStatusType, Product, StatusLogEntry},
    test_utils::prepare_env::{drop_test_db, new_test_db, order_request, seed_catalog},
    SqliteDatabase,
};
use serde_json::json;

use super::helpers::{admin_request, call_market, payment_body, signed_webhook, test_config};
use crate::config::ServerConfig;

fn json_request(req: TestRequest, body: serde_json::Value) -> TestRequest {
    req.insert_header(("Content-Type", "application/json")).set_payload(body.to_string())
}

async fn paid_order(db: &SqliteDatabase, config: &ServerConfig, lines: &[(&Product, i64)], amount: i64) -> Order {
    let body = serde_json::to_value(order_request(lines)).unwrap();
    let (status, res) = call_market(db, config, json_request(TestRequest::post().uri("/order"), body)).await;
    assert_eq!(status, StatusCode::CREATED, "{res}");
    let order: Order = serde_json::from_str(&res).unwrap();
    let signature = format!("sig-{}", order.id);
    let webhook = signed_webhook(&payment_body(order.id.as_str(), &signature, amount));
    let (status, res) = call_market(db, config, webhook).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    order
}

async fn admin_post(
    db: &SqliteDatabase,
    config: &ServerConfig,
    path: &str,
    body: serde_json::Value,
) -> (StatusCode, String) {
    call_market(db, config, admin_request(json_request(TestRequest::post().uri(path), body))).await
}

async fn product(db: &SqliteDatabase, config: &ServerConfig, slug: &str) -> Product {
    let (_, body) = call_market(db, config, TestRequest::get().uri(&format!("/product/{slug}"))).await;
    serde_json::from_str(&body).unwrap()
}

#[actix_web::test]
async fn checkout_validation() {
    let db = new_test_db().await;
    let products = seed_catalog(&db).await;
    let config = test_config();

    let mut body = serde_json::to_value(order_request(&[(&products[0], 1)])).unwrap();
    body["customer_wallet"] = json!("0xnot-a-solana-wallet");
    let (status, res) = call_market(&db, &config, json_request(TestRequest::post().uri("/order"), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{res}");

    // Saffron is sold out
    let body = serde_json::to_value(order_request(&[(&products[2], 1)])).unwrap();
    let (status, _) = call_market(&db, &config, json_request(TestRequest::post().uri("/order"), body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let body = serde_json::to_value(order_request(&[(&products[0], i64::MAX), (&products[0], 2)])).unwrap();
    let (status, res) = call_market(&db, &config, json_request(TestRequest::post().uri("/order"), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{res}");
    assert!(res.contains("too large"), "{res}");

    let (status, res) = call_market(&db, &config, json_request(TestRequest::post().uri("/order"), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(res.starts_with(r#"{"error":"Could not read request body"#), "{res}");
    drop_test_db(db).await;
}

#[actix_web::test]
async fn fulfil_order_commits_stock() {
    let db = new_test_db().await;
    let products = seed_catalog(&db).await;
    let config = test_config();
    let order = paid_order(&db, &config, &[(&products[0], 2)], 4_000_000).await;

    let body = json!({ "order_id": order.id, "reason": "Shipped with La Poste" });
    let req = json_request(TestRequest::post().uri("/api/fulfill"), body.clone());
    let (status, _) = call_market(&db, &config, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, res) = admin_post(&db, &config, "/api/fulfill", body).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    let fulfilled: Order = serde_json::from_str(&res).unwrap();
    assert_eq!(fulfilled.status, OrderStatusType::Fulfilled);
    assert_eq!(product(&db, &config, "organic-apples").await.stock, 8);

    let body = json!({ "order_id": order.id, "reason": "Changed my mind" });
    let (status, _) = admin_post(&db, &config, "/api/cancel", body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = admin_request(TestRequest::get().uri(&format!("/api/order/{}/history", order.id)));
    let (status, res) = call_market(&db, &config, req).await;
    assert_eq!(status, StatusCode::OK);
    let history: Vec<StatusLogEntry> = serde_json::from_str(&res).unwrap();
    let steps = history.iter().map(|e| (e.old_status, e.new_status)).collect::<Vec<_>>();
    assert_eq!(steps, vec![
        (None, OrderStatusType::Pending),
        (Some(OrderStatusType::Pending), OrderStatusType::Paid),
        (Some(OrderStatusType::Paid), OrderStatusType::Fulfilled),
    ]);
    drop_test_db(db).await;
}

#[actix_web::test]
async fn cancelling_processing_order_releases_stock() {
    let db = new_test_db().await;
    let products = seed_catalog(&db).await;
    let config = test_config();
    let order = paid_order(&db, &config, &[(&products[1], 3)], 13_500_000).await;

    let body = json!({ "order_id": order.id, "status": "processing", "reason": "Packing" });
    let (status, res) = admin_post(&db, &config, "/api/order_status", body).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    let bread = product(&db, &config, "sourdough-bread").await;
    assert_eq!(bread.stock, 0);
    assert!(!bread.in_stock);

    let body = json!({ "order_id": order.id, "status": "pending", "reason": "Oops" });
    let (status, _) = admin_post(&db, &config, "/api/order_status", body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let body = json!({ "order_id": order.id, "reason": "Bakery closed" });
    let (status, res) = admin_post(&db, &config, "/api/cancel", body).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    let cancelled: Order = serde_json::from_str(&res).unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
    let bread = product(&db, &config, "sourdough-bread").await;
    assert_eq!(bread.stock, 3);
    assert!(bread.in_stock);
    drop_test_db(db).await;
}

#[actix_web::test]
async fn resolve_underpayment() {
    let db = new_test_db().await;
    let products = seed_catalog(&db).await;
    let config = test_config();
    let approved = paid_order(&db, &config, &[(&products[0], 1)], 1_500_000).await;
    let rejected = paid_order(&db, &config, &[(&products[0], 1)], 1_000_000).await;

    let req = admin_request(TestRequest::get().uri("/api/orders?awaiting_review=true"));
    let (status, res) = call_market(&db, &config, req).await;
    assert_eq!(status, StatusCode::OK);
    let waiting: Vec<Order> = serde_json::from_str(&res).unwrap();
    assert_eq!(waiting.len(), 2);

    let body = json!({ "order_id": approved.id, "decision": "approve", "notes": "Regular customer" });
    let (status, res) = admin_post(&db, &config, "/api/resolve_discrepancy", body.clone()).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    let order: Order = serde_json::from_str(&res).unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.payment_discrepancy.resolution, Some(DiscrepancyResolution::Approved));
    assert_eq!(order.payment_discrepancy.resolution_notes.as_deref(), Some("Regular customer"));

    // Nothing left to resolve
    let (status, _) = admin_post(&db, &config, "/api/resolve_discrepancy", body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let body = json!({ "order_id": rejected.id, "decision": "reject" });
    let (status, res) = admin_post(&db, &config, "/api/resolve_discrepancy", body).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    let order: Order = serde_json::from_str(&res).unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert_eq!(order.payment_discrepancy.resolution, Some(DiscrepancyResolution::Rejected));
    drop_test_db(db).await;
}

#[actix_web::test]
async fn admin_notes() {
    let db = new_test_db().await;
    let products = seed_catalog(&db).await;
    let config = test_config();
    let order = paid_order(&db, &config, &[(&products[0], 1)], 2_000_000).await;

    let body = json!({ "order_id": order.id, "notes": "Leave with the neighbour" });
    let req = admin_request(json_request(TestRequest::patch().uri("/api/order_notes"), body));
    let (status, res) = call_market(&db, &config, req).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    let order: Order = serde_json::from_str(&res).unwrap();
    assert_eq!(order.admin_notes.as_deref(), Some("Leave with the neighbour"));
    assert_eq!(order.status, OrderStatusType::Paid);
    drop_test_db(db).await;
}

#[actix_web::test]
async fn manage_catalog() {
    let db = new_test_db().await;
    seed_catalog(&db).await;
    let config = test_config();

    let body = json!({
        "name": "Comté 18 months",
        "slug": "comte-18",
        "price_elurc": 12_000_000,
        "price_eur": 1190,
        "stock": 4,
        "category": "cheese",
    });
    let (status, res) = admin_post(&db, &config, "/api/products", body.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{res}");
    let comte: Product = serde_json::from_str(&res).unwrap();
    assert!(comte.in_stock);
    assert_eq!(comte.category.as_deref(), Some("cheese"));

    let (status, _) = admin_post(&db, &config, "/api/products", body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let body = json!({ "product_id": comte.id, "stock": -1 });
    let req = admin_request(json_request(TestRequest::patch().uri("/api/product_stock"), body));
    let (status, _) = call_market(&db, &config, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = json!({ "product_id": comte.id, "stock": 0 });
    let req = admin_request(json_request(TestRequest::patch().uri("/api/product_stock"), body));
    let (status, res) = call_market(&db, &config, req).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    let comte: Product = serde_json::from_str(&res).unwrap();
    assert!(!comte.in_stock);

    let (status, res) = call_market(&db, &config, TestRequest::get().uri("/products?in_stock=true")).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<Product> = serde_json::from_str(&res).unwrap();
    let slugs = listed.iter().map(|p| p.slug.as_str()).collect::<Vec<_>>();
    assert_eq!(slugs, vec!["organic-apples", "sourdough-bread"]);
    drop_test_db(db).await;
}
