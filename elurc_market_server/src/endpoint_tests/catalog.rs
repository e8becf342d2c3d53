use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use elurc_market_engine::{db_types::Product, CatalogApi};

use super::{
    helpers::call,
    mocks::{sample_product, MockCatalogManager},
};
use crate::routes::{ProductBySlugRoute, ProductsRoute};

fn configure(catalog: MockCatalogManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(CatalogApi::new(catalog)))
            .service(ProductsRoute::<MockCatalogManager>::new())
            .service(ProductBySlugRoute::<MockCatalogManager>::new());
    }
}

#[actix_web::test]
async fn list_products() {
    let _ = env_logger::try_init().ok();
    let mut catalog = MockCatalogManager::new();
    catalog
        .expect_fetch_products()
        .withf(|only_in_stock| !*only_in_stock)
        .returning(|_| Ok(vec![sample_product("organic-apples", 10), sample_product("saffron-threads", 0)]));
    let (status, body) = call(configure(catalog), TestRequest::get().uri("/products")).await;
    assert_eq!(status, StatusCode::OK);
    let products: Vec<Product> = serde_json::from_str(&body).unwrap();
    assert_eq!(products.len(), 2);
    assert!(!products[1].in_stock);
}

#[actix_web::test]
async fn list_products_in_stock_only() {
    let _ = env_logger::try_init().ok();
    let mut catalog = MockCatalogManager::new();
    catalog
        .expect_fetch_products()
        .withf(|only_in_stock| *only_in_stock)
        .times(1)
        .returning(|_| Ok(vec![sample_product("organic-apples", 10)]));
    let (status, body) = call(configure(catalog), TestRequest::get().uri("/products?in_stock=true")).await;
    assert_eq!(status, StatusCode::OK);
    let products: Vec<Product> = serde_json::from_str(&body).unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].slug, "organic-apples");
}

#[actix_web::test]
async fn invalid_query_string() {
    let _ = env_logger::try_init().ok();
    let catalog = MockCatalogManager::new();
    let (status, body) = call(configure(catalog), TestRequest::get().uri("/products?in_stock=maybe")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"error":"Could not read request path"#), "{body}");
}

#[actix_web::test]
async fn product_by_slug() {
    let _ = env_logger::try_init().ok();
    let mut catalog = MockCatalogManager::new();
    catalog
        .expect_fetch_product_by_slug()
        .returning(|slug| Ok((slug == "organic-apples").then(|| sample_product(slug, 10))));
    let (status, body) = call(configure(catalog), TestRequest::get().uri("/product/organic-apples")).await;
    assert_eq!(status, StatusCode::OK);
    let product: Product = serde_json::from_str(&body).unwrap();
    assert_eq!(product.stock, 10);

    let mut catalog = MockCatalogManager::new();
    catalog.expect_fetch_product_by_slug().returning(|_| Ok(None));
    let (status, body) = call(configure(catalog), TestRequest::get().uri("/product/truffles")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. No product with slug 'truffles'"}"#);
}
