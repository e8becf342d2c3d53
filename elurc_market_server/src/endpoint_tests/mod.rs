mod admin;
mod catalog;
mod helpers;
mod mocks;
mod orders;
mod webhook;

use actix_web::{http::StatusCode, test::TestRequest};

use crate::routes::health;

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/health");
    let (status, body) = helpers::call(|cfg| { cfg.service(health); }, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}
