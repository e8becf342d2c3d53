use anyhow::{anyhow, Result};
use elurc_common::Secret;
use elurc_market_engine::{
    db_types::{Order, OrderId, OrderStatusType, Product, StatusLogEntry},
    order_objects::{DiscrepancyDecision, OrderRequest, OrderStatusSummary, PaymentConfirmation},
};
use elurc_market_server::{
    data_objects::{
        ModifyOrderParams,
        OrderSearchParams,
        PaymentResult,
        ResolveDiscrepancyParams,
        UpdateOrderStatusParams,
    },
    helpers::calculate_hmac,
    middleware::{ADMIN_KEY_HEADER, HMAC_HEADER},
};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client,
    RequestBuilder,
    Response,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

/// HTTP client for the marketplace server.
///
/// Public calls need no credentials. Admin calls send the admin API key, and [`MarketClient::confirm_payment`] signs
/// its body with the webhook secret, exactly as the ledger verifier does.
pub struct MarketClient {
    client: Client,
    server: Url,
    admin_key: Secret<String>,
    hmac_secret: Secret<String>,
}

impl MarketClient {
    pub fn new(server: Url, admin_key: Secret<String>, hmac_secret: Secret<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder().user_agent("ELURC Market Client").default_headers(headers).build()?;
        Ok(Self { client, server, admin_key, hmac_secret })
    }

    pub fn server(&self) -> &str {
        self.server.as_str()
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        self.server.join(path).map_err(|e| anyhow!("Failed to join URL: {e}"))
    }

    pub async fn health(&self) -> Result<String> {
        let res = self.client.get(self.url("/health")?).send().await?;
        Ok(res.text().await?)
    }

    pub async fn products(&self, in_stock: bool) -> Result<Vec<Product>> {
        let res = self.client.get(self.url("/products")?).query(&[("in_stock", in_stock)]).send().await?;
        parse_response(res).await
    }

    pub async fn create_order(&self, request: &OrderRequest) -> Result<Order> {
        let res = self.client.post(self.url("/order")?).json(request).send().await?;
        parse_response(res).await
    }

    pub async fn order(&self, order_id: &OrderId) -> Result<Order> {
        let res = self.client.get(self.url(&format!("/order/{order_id}"))?).send().await?;
        parse_response(res).await
    }

    /// Returns `None` if the server does not know the order.
    pub async fn order_status(&self, order_id: &OrderId) -> Result<Option<OrderStatusSummary>> {
        let res = self.client.get(self.url(&format!("/order/{order_id}/status"))?).send().await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse_response(res).await.map(Some)
    }

    pub async fn search_orders(&self, params: &OrderSearchParams) -> Result<Vec<Order>> {
        let req = self.client.get(self.url("/api/orders")?).query(params);
        self.send_as_admin(req).await
    }

    pub async fn order_history(&self, order_id: &OrderId) -> Result<Vec<StatusLogEntry>> {
        let req = self.client.get(self.url(&format!("/api/order/{order_id}/history"))?);
        self.send_as_admin(req).await
    }

    pub async fn fulfil_order(&self, order_id: &OrderId, reason: &str) -> Result<Order> {
        let params = ModifyOrderParams { order_id: order_id.clone(), reason: reason.to_string() };
        self.admin_post("/api/fulfill", &params).await
    }

    pub async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<Order> {
        let params = ModifyOrderParams { order_id: order_id.clone(), reason: reason.to_string() };
        self.admin_post("/api/cancel", &params).await
    }

    pub async fn set_order_status(&self, order_id: &OrderId, status: OrderStatusType, reason: &str) -> Result<Order> {
        let params = UpdateOrderStatusParams { order_id: order_id.clone(), status, reason: reason.to_string() };
        self.admin_post("/api/order_status", &params).await
    }

    pub async fn resolve_discrepancy(
        &self,
        order_id: &OrderId,
        decision: DiscrepancyDecision,
        notes: &str,
    ) -> Result<Order> {
        let params = ResolveDiscrepancyParams { order_id: order_id.clone(), decision, notes: notes.to_string() };
        self.admin_post("/api/resolve_discrepancy", &params).await
    }

    /// Sends a signed payment confirmation to the verifier webhook.
    pub async fn confirm_payment(&self, payment: &PaymentConfirmation) -> Result<PaymentResult> {
        if self.hmac_secret.is_empty() {
            return Err(anyhow!("No webhook secret is configured. Set ELURC_WEBHOOK_HMAC_SECRET."));
        }
        let body = serde_json::to_string(payment)?;
        let signature = calculate_hmac(self.hmac_secret.reveal(), body.as_bytes())
            .map_err(|e| anyhow!("Could not sign the payment confirmation. {e}"))?;
        debug!("Sending payment confirmation for {}", payment.order_id);
        let res = self
            .client
            .post(self.url("/webhook/payment_confirmed")?)
            .header(CONTENT_TYPE, "application/json")
            .header(HMAC_HEADER, signature)
            .body(body)
            .send()
            .await?;
        parse_response(res).await
    }

    async fn admin_post<T: Serialize, R: DeserializeOwned>(&self, path: &str, body: &T) -> Result<R> {
        let req = self.client.post(self.url(path)?).json(body);
        self.send_as_admin(req).await
    }

    async fn send_as_admin<R: DeserializeOwned>(&self, req: RequestBuilder) -> Result<R> {
        if self.admin_key.is_empty() {
            return Err(anyhow!("No admin API key is configured. Set ELURC_ADMIN_API_KEY."));
        }
        let res = req.header(ADMIN_KEY_HEADER, self.admin_key.reveal().as_str()).send().await?;
        parse_response(res).await
    }
}

async fn parse_response<R: DeserializeOwned>(res: Response) -> Result<R> {
    let status = res.status();
    if !status.is_success() {
        let msg = res.text().await?;
        return Err(anyhow!("Request failed with status {status}. {msg}"));
    }
    Ok(res.json::<R>().await?)
}
