use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use elurc_common::Secret;
use elurc_market_engine::{
    db_types::{Order, OrderStatusType},
    order_objects::OrderStatusSummary,
    OrderApiError,
    OrderQueryApi,
};

use super::{
    helpers::{admin_request, call, ADMIN_KEY},
    mocks::{sample_order, MockOrderManager},
};
use crate::{
    middleware::{AclMiddlewareFactory, ADMIN_KEY_HEADER},
    routes::{OrderByIdRoute, OrderHistoryRoute, OrderStatusRoute, SearchOrdersRoute},
};

fn configure(orders: MockOrderManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let admin = web::scope("/api")
            .wrap(AclMiddlewareFactory::new(Secret::new(ADMIN_KEY.to_string())))
            .service(SearchOrdersRoute::<MockOrderManager>::new())
            .service(OrderHistoryRoute::<MockOrderManager>::new());
        cfg.app_data(web::Data::new(OrderQueryApi::new(orders)))
            .service(OrderStatusRoute::<MockOrderManager>::new())
            .service(OrderByIdRoute::<MockOrderManager>::new())
            .service(admin);
    }
}

fn single_order_db(status: OrderStatusType) -> MockOrderManager {
    let mut orders = MockOrderManager::new();
    orders
        .expect_fetch_order_by_id()
        .returning(move |id| Ok((id.as_str() == "ord-1").then(|| sample_order("ord-1", status))));
    orders
}

#[actix_web::test]
async fn fetch_order_by_id() {
    let _ = env_logger::try_init().ok();
    let orders = single_order_db(OrderStatusType::Pending);
    let (status, body) = call(configure(orders), TestRequest::get().uri("/order/ord-1")).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.order_number, "ELR-20240309-K3J9QX");
    assert_eq!(order.items.len(), 1);
}

#[actix_web::test]
async fn fetch_missing_order() {
    let _ = env_logger::try_init().ok();
    let orders = single_order_db(OrderStatusType::Pending);
    let (status, body) = call(configure(orders), TestRequest::get().uri("/order/ord-404")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. ord-404"}"#);
}

#[actix_web::test]
async fn poll_order_status() {
    let _ = env_logger::try_init().ok();
    let orders = single_order_db(OrderStatusType::Paid);
    let (status, body) = call(configure(orders), TestRequest::get().uri("/order/ord-1/status")).await;
    assert_eq!(status, StatusCode::OK);
    let summary: OrderStatusSummary = serde_json::from_str(&body).unwrap();
    assert_eq!(summary.status, OrderStatusType::Paid);
    assert!(!summary.awaiting_review);
    assert_eq!(summary.order_id.as_str(), "ord-1");
}

#[actix_web::test]
async fn search_requires_admin_key() {
    let _ = env_logger::try_init().ok();
    let orders = MockOrderManager::new();
    let (status, body) = call(configure(orders), TestRequest::get().uri("/api/orders")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication Error. No admin API key was provided."}"#);

    let orders = MockOrderManager::new();
    let req = TestRequest::get().uri("/api/orders").insert_header((ADMIN_KEY_HEADER, "guess"));
    let (status, body) = call(configure(orders), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Authentication Error. The admin API key is not valid."}"#);
}

#[actix_web::test]
async fn search_orders_by_status() {
    let _ = env_logger::try_init().ok();
    let mut orders = MockOrderManager::new();
    orders
        .expect_search_orders()
        .withf(|q| {
            q.status == Some(vec![OrderStatusType::Pending, OrderStatusType::Timeout]) &&
                q.customer_wallet.is_none() &&
                !q.awaiting_review
        })
        .times(1)
        .returning(|_| {
            Ok(vec![sample_order("ord-1", OrderStatusType::Pending), sample_order("ord-2", OrderStatusType::Timeout)])
        });
    let req = admin_request(TestRequest::get().uri("/api/orders?status=pending,timeout"));
    let (status, body) = call(configure(orders), req).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[1].status, OrderStatusType::Timeout);
}

#[actix_web::test]
async fn search_with_unknown_status() {
    let _ = env_logger::try_init().ok();
    let orders = MockOrderManager::new();
    let req = admin_request(TestRequest::get().uri("/api/orders?status=shipped"));
    let (status, _) = call(configure(orders), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn search_backend_failure() {
    let _ = env_logger::try_init().ok();
    let mut orders = MockOrderManager::new();
    orders.expect_search_orders().returning(|_| Err(OrderApiError::DatabaseError("disk on fire".into())));
    let req = admin_request(TestRequest::get().uri("/api/orders?awaiting_review=true"));
    let (status, _) = call(configure(orders), req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn empty_history_is_not_found() {
    let _ = env_logger::try_init().ok();
    let mut orders = MockOrderManager::new();
    orders.expect_fetch_status_history().returning(|_| Ok(vec![]));
    let req = admin_request(TestRequest::get().uri("/api/order/ord-404/history"));
    let (status, _) = call(configure(orders), req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
