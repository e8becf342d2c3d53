use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpRequest, HttpServer};
use elurc_market_engine::{
    events::EventProducers,
    traits::MarketplaceDatabase,
    CatalogApi,
    OrderFlowApi,
    OrderQueryApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    middleware::{AclMiddlewareFactory, HmacMiddlewareFactory, WhitelistMiddlewareFactory, HMAC_HEADER},
    notifications::{create_notification_handlers, LogSink},
    routes::{
        health,
        CancelOrderRoute,
        CreateOrderRoute,
        CreateProductRoute,
        FulfilOrderRoute,
        OrderByIdRoute,
        OrderHistoryRoute,
        OrderStatusRoute,
        PaymentConfirmedRoute,
        ProductBySlugRoute,
        ProductsRoute,
        ResolveDiscrepancyRoute,
        SearchOrdersRoute,
        UpdateOrderNotesRoute,
        UpdateOrderStatusRoute,
        UpdateStockRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_notification_handlers(Arc::new(LogSink));
    let producers = handlers.producers();
    handlers.start_handlers();
    let _expiry_worker = start_expiry_worker(db.clone(), producers.clone(), config.order_flow_options());
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api =
            OrderFlowApi::new(db.clone(), producers.clone()).with_options(config.order_flow_options());
        let query_api = OrderQueryApi::new(db.clone());
        let catalog_api = CatalogApi::new(db.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("ems::access_log"))
            .app_data(json_config())
            .app_data(query_config())
            .app_data(path_config())
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(query_api))
            .app_data(web::Data::new(catalog_api))
            .configure(|cfg| configure_routes::<SqliteDatabase>(cfg, &config))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Registers every route on `cfg`, for the storage backend `B`.
///
/// * Public routes sit at the root.
/// * `/webhook` is guarded by the verifier IP whitelist and then the HMAC check.
/// * `/api` is guarded by the admin API key.
///
/// The APIs the handlers use (`OrderFlowApi<B>`, `OrderQueryApi<B>`, `CatalogApi<B>`) must be registered as app data
/// by the caller.
pub fn configure_routes<B>(cfg: &mut web::ServiceConfig, config: &ServerConfig)
where B: MarketplaceDatabase + 'static {
    let options = ServerOptions::from_config(config);
    let webhook_scope = web::scope("/webhook")
        .wrap(HmacMiddlewareFactory::new(
            HMAC_HEADER,
            config.webhook.hmac_secret.clone(),
            config.webhook.hmac_checks,
        ))
        .wrap(WhitelistMiddlewareFactory::new(&options))
        .service(PaymentConfirmedRoute::<B>::new());
    let admin_scope = web::scope("/api")
        .wrap(AclMiddlewareFactory::new(config.admin_api_key.clone()))
        .service(SearchOrdersRoute::<B>::new())
        .service(OrderHistoryRoute::<B>::new())
        .service(FulfilOrderRoute::<B>::new())
        .service(CancelOrderRoute::<B>::new())
        .service(UpdateOrderStatusRoute::<B>::new())
        .service(ResolveDiscrepancyRoute::<B>::new())
        .service(UpdateOrderNotesRoute::<B>::new())
        .service(CreateProductRoute::<B>::new())
        .service(UpdateStockRoute::<B>::new());
    cfg.service(health)
        .service(ProductsRoute::<B>::new())
        .service(ProductBySlugRoute::<B>::new())
        .service(CreateOrderRoute::<B>::new())
        .service(OrderStatusRoute::<B>::new())
        .service(OrderByIdRoute::<B>::new())
        .service(webhook_scope)
        .service(admin_scope);
}

/// Malformed JSON bodies get the same `{"error": ...}` response as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req: &HttpRequest| {
        debug!("💻️ Invalid JSON body for {}. {err}", req.path());
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, req: &HttpRequest| {
        debug!("💻️ Invalid query string for {}. {err}", req.path());
        ServerError::InvalidRequestPath(err.to_string()).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, req: &HttpRequest| {
        debug!("💻️ Invalid path {}. {err}", req.path());
        ServerError::InvalidRequestPath(err.to_string()).into()
    })
}
