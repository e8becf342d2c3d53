//! Request handler definitions
//!
//! Access control is not applied here. The server wraps the `/webhook` and `/api` scopes in the HMAC, whitelist and
//! admin key middleware, see [`crate::server`].
use actix_web::{get, web, HttpResponse, Responder};
use elurc_market_engine::{
    db_types::{NewProduct, OrderId},
    order_objects::{OrderQueryFilter, OrderRequest, PaymentConfirmation},
    traits::{CatalogManagement, MarketplaceDatabase, OrderManagement},
    CatalogApi,
    OrderFlowApi,
    OrderQueryApi,
};
use log::*;

use crate::{
    data_objects::{
        ModifyOrderParams,
        OrderSearchParams,
        PaymentResult,
        ProductListParams,
        ResolveDiscrepancyParams,
        UpdateNotesParams,
        UpdateOrderStatusParams,
        UpdateStockParams,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Catalog  ----------------------------------------------------
route!(products => Get "/products" impl CatalogManagement);
/// Lists the product catalog. Pass `?in_stock=true` to leave out sold-out products.
pub async fn products<B: CatalogManagement>(
    query: web::Query<ProductListParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let only_in_stock = query.in_stock;
    debug!("💻️ GET products (only in stock: {only_in_stock})");
    let products = api.list_products(only_in_stock).await.map_err(|e| {
        debug!("💻️ Could not fetch products. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(products))
}

route!(product_by_slug => Get "/product/{slug}" impl CatalogManagement);
pub async fn product_by_slug<B: CatalogManagement>(
    path: web::Path<String>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let slug = path.into_inner();
    debug!("💻️ GET product {slug}");
    let product = api
        .product_by_slug(&slug)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No product with slug '{slug}'")))?;
    Ok(HttpResponse::Ok().json(product))
}

route!(create_product => Post "/products" impl CatalogManagement);
/// Admin route to add a product to the catalog. Slugs must be unique.
pub async fn create_product<B: CatalogManagement>(
    body: web::Json<NewProduct>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product = body.into_inner();
    info!("💻️ Create product request for '{}'", product.slug);
    let product = api.create_product(product).await.map_err(|e| {
        debug!("💻️ Could not create product. {e}");
        e
    })?;
    Ok(HttpResponse::Created().json(product))
}

route!(update_stock => Patch "/product_stock" impl CatalogManagement);
/// Admin route to overwrite the stock level of a product, e.g. after a delivery or a stock take.
pub async fn update_stock<B: CatalogManagement>(
    body: web::Json<UpdateStockParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let UpdateStockParams { product_id, stock } = body.into_inner();
    info!("💻️ Setting stock for product {product_id} to {stock}");
    let product = api.set_stock(&product_id, stock).await.map_err(|e| {
        debug!("💻️ Could not update stock. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(product))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/order" impl MarketplaceDatabase);
/// Checkout. Creates a `pending` order from the items in the request.
///
/// Prices are taken from the catalog at the time of the request, so the customer pays what they saw. The response is
/// the new order, including its `order_number` and the `amount_elurc` the customer must transfer.
pub async fn create_order<B: MarketplaceDatabase>(
    body: web::Json<OrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ New order request with {} lines for {}", request.items.len(), request.customer_wallet);
    let order = api.process_new_order(request).await.map_err(|e| {
        debug!("💻️ Could not create order. {e}");
        e
    })?;
    Ok(HttpResponse::Created().json(order))
}

route!(order_by_id => Get "/order/{order_id}" impl OrderManagement);
pub async fn order_by_id<B: OrderManagement>(
    path: web::Path<OrderId>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order_by_id({order_id})");
    let order = api.order_by_id(&order_id).await?.ok_or_else(|| ServerError::NoRecordFound(order_id.to_string()))?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_status => Get "/order/{order_id}/status" impl OrderManagement);
/// The endpoint the payment poller hits. Returns a compact summary of the order's status and payment state.
pub async fn order_status<B: OrderManagement>(
    path: web::Path<OrderId>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET order_status({order_id})");
    let summary =
        api.order_status(&order_id).await?.ok_or_else(|| ServerError::NoRecordFound(order_id.to_string()))?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(search_orders => Get "/orders" impl OrderManagement);
/// Admin order search. All query parameters are optional:
/// * `order_number`, `customer_wallet`
/// * `since`, `until`: RFC 3339 timestamps bounding the creation date
/// * `status`: comma-separated list of statuses
/// * `awaiting_review`: only orders with an underpayment waiting for a decision
pub async fn search_orders<B: OrderManagement>(
    query: web::Query<OrderSearchParams>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = OrderQueryFilter::try_from(query.into_inner()).map_err(ServerError::InvalidRequestPath)?;
    debug!("💻️ GET orders search for [{query}]");
    let orders = api.search_orders(query).await.map_err(|e| {
        debug!("💻️ Could not fetch orders. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_history => Get "/order/{order_id}/history" impl OrderManagement);
/// Admin route returning the status log of an order, oldest entry first.
pub async fn order_history<B: OrderManagement>(
    path: web::Path<OrderId>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order_history({order_id})");
    let history = api.status_history(&order_id).await?;
    if history.is_empty() {
        return Err(ServerError::NoRecordFound(order_id.to_string()));
    }
    Ok(HttpResponse::Ok().json(history))
}

//----------------------------------------------   Modify ----------------------------------------------------
route!(fulfil_order => Post "/fulfill" impl MarketplaceDatabase);
/// Marks a paid (or processing) order as shipped. The stock for its items is taken out of the catalog in the same
/// transaction. If any item is short, nothing changes and the call fails with a 409.
pub async fn fulfil_order<B: MarketplaceDatabase>(
    body: web::Json<ModifyOrderParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let ModifyOrderParams { order_id, reason } = body.into_inner();
    info!("💻️ Fulfilment request for {order_id} with reason: {reason}");
    let order = api.fulfil_order(&order_id, &reason).await.map_err(|e| {
        debug!("💻️ Could not fulfil order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/cancel" impl MarketplaceDatabase);
/// Order cancellation
///
/// Admins can cancel pending, paid and processing orders. Cancelling a processing order returns its stock to the
/// catalog. Fulfilled orders cannot be cancelled.
///
/// ## Parameters
/// * `order_id` - The order id to cancel. String.
/// * `reason` - The reason for the cancellation. String.
///
/// ## Returns
/// The cancelled order object.
pub async fn cancel_order<B: MarketplaceDatabase>(
    body: web::Json<ModifyOrderParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let ModifyOrderParams { order_id, reason } = body.into_inner();
    info!("💻️ Cancel order request for {order_id}. Reason: {reason}");
    let order = api.cancel_order(&order_id, &reason).await.map_err(|e| {
        debug!("💻️ Could not cancel order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_status => Post "/order_status" impl MarketplaceDatabase);
/// Moves an order to any status the order state machine allows from where it is now.
pub async fn update_order_status<B: MarketplaceDatabase>(
    body: web::Json<UpdateOrderStatusParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let UpdateOrderStatusParams { order_id, status, reason } = body.into_inner();
    info!("💻️ Status change request for {order_id} to {status}. Reason: {reason}");
    let order = api.modify_status_for_order(&order_id, status, &reason).await.map_err(|e| {
        debug!("💻️ Could not change order status. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(resolve_discrepancy => Post "/resolve_discrepancy" impl MarketplaceDatabase);
/// Records the admin decision on an underpaid order. `approve` marks the order paid, `reject` cancels it.
pub async fn resolve_discrepancy<B: MarketplaceDatabase>(
    body: web::Json<ResolveDiscrepancyParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let ResolveDiscrepancyParams { order_id, decision, notes } = body.into_inner();
    info!("💻️ Discrepancy decision for {order_id}: {decision}. Notes: {notes}");
    let order = api.resolve_discrepancy(&order_id, decision, &notes).await.map_err(|e| {
        debug!("💻️ Could not resolve discrepancy. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_notes => Patch "/order_notes" impl MarketplaceDatabase);
/// Replaces the admin notes on an order. The order status is not touched.
pub async fn update_order_notes<B: MarketplaceDatabase>(
    body: web::Json<UpdateNotesParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let UpdateNotesParams { order_id, notes } = body.into_inner();
    info!("💻️ Updating admin notes for {order_id}");
    let order = api.update_admin_notes(&order_id, &notes).await.map_err(|e| {
        debug!("💻️ Could not update admin notes. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

//------------------------------------------   Incoming payments  ---------------------------------------------
route!(payment_confirmed => Post "/payment_confirmed" impl MarketplaceDatabase);
/// Payment confirmations from the ledger verifier.
///
/// The verifier calls this once a transaction has settled on chain. Calls are idempotent: sending the same
/// transaction signature for the same order again returns `already_recorded` and changes nothing.
///
/// The `result` field of the response tells the verifier what happened:
/// * `paid` - the order is paid, possibly with an overpayment or a tolerated shortfall recorded.
/// * `held_for_review` - the payment fell short and the order waits for an admin.
/// * `already_recorded` - a repeat of an earlier confirmation.
pub async fn payment_confirmed<B: MarketplaceDatabase>(
    body: web::Json<PaymentConfirmation>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payment = body.into_inner();
    info!(
        "💻️ Payment confirmation for order {}: {} in transaction {}",
        payment.order_id, payment.amount_received, payment.transaction_signature
    );
    let outcome = api.confirm_payment(payment).await.map_err(|e| {
        warn!("💻️ Payment confirmation was not applied. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(PaymentResult::from(outcome)))
}
