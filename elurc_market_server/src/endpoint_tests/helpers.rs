use actix_web::{
    http::StatusCode,
    test,
    test::TestRequest,
    web::{self, ServiceConfig},
    App,
};
use elurc_common::Secret;
use elurc_market_engine::{events::EventProducers, CatalogApi, OrderFlowApi, OrderQueryApi, SqliteDatabase};
use log::debug;

use crate::{
    config::ServerConfig,
    helpers::calculate_hmac,
    middleware::{ADMIN_KEY_HEADER, HMAC_HEADER},
    server::{configure_routes, json_config, path_config, query_config},
};

pub const ADMIN_KEY: &str = "test-admin-key";
pub const HMAC_SECRET: &str = "test-webhook-secret";

/// Runs a single request against an app built by `configure`, and returns the status and body.
pub async fn call<F>(configure: F, req: TestRequest) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().app_data(json_config()).app_data(query_config()).app_data(path_config()).configure(configure);
    let service = test::init_service(app).await;
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
    debug!("Response: {status} {body}");
    (status, body)
}

/// A server configuration with a known admin key and webhook secret, and no verifier whitelist.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::new("127.0.0.1", 8470);
    config.admin_api_key = Secret::new(ADMIN_KEY.to_string());
    config.webhook.hmac_secret = Secret::new(HMAC_SECRET.to_string());
    config.webhook.hmac_checks = true;
    config
}

/// Runs a request against the full route table, backed by `db`.
pub async fn call_market(db: &SqliteDatabase, config: &ServerConfig, req: TestRequest) -> (StatusCode, String) {
    let orders_api = OrderFlowApi::new(db.clone(), EventProducers::default()).with_options(config.order_flow_options());
    let query_api = OrderQueryApi::new(db.clone());
    let catalog_api = CatalogApi::new(db.clone());
    call(
        |cfg| {
            cfg.app_data(web::Data::new(orders_api))
                .app_data(web::Data::new(query_api))
                .app_data(web::Data::new(catalog_api));
            configure_routes::<SqliteDatabase>(cfg, config);
        },
        req,
    )
    .await
}

pub fn admin_request(req: TestRequest) -> TestRequest {
    req.insert_header((ADMIN_KEY_HEADER, ADMIN_KEY))
}

/// A webhook request with `body` signed using the test secret.
pub fn signed_webhook(body: &str) -> TestRequest {
    let signature = calculate_hmac(HMAC_SECRET, body.as_bytes()).unwrap();
    TestRequest::post()
        .uri("/webhook/payment_confirmed")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((HMAC_HEADER, signature))
        .set_payload(body.to_string())
}

pub fn payment_body(order_id: &str, signature: &str, lamports: i64) -> String {
    serde_json::json!({
        "order_id": order_id,
        "transaction_signature": signature,
        "amount_received": lamports,
    })
    .to_string()
}
