use std::fmt::Display;

use chrono::{DateTime, Utc};
use elurc_common::helpers::split_list;
use elurc_market_engine::{
    db_types::{Order, OrderId, OrderStatusType, ProductId},
    order_objects::{DiscrepancyDecision, OrderQueryFilter, PaymentOutcome},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body for the fulfil and cancel endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifyOrderParams {
    pub order_id: OrderId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusParams {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveDiscrepancyParams {
    pub order_id: OrderId,
    pub decision: DiscrepancyDecision,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNotesParams {
    pub order_id: OrderId,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStockParams {
    pub product_id: ProductId,
    pub stock: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductListParams {
    #[serde(default)]
    pub in_stock: bool,
}

/// Query string for the admin order search. `status` is a comma-separated list, e.g. `status=pending,timeout`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchParams {
    pub order_number: Option<String>,
    pub customer_wallet: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<String>,
    #[serde(default)]
    pub awaiting_review: bool,
}

impl TryFrom<OrderSearchParams> for OrderQueryFilter {
    type Error = String;

    fn try_from(params: OrderSearchParams) -> Result<Self, Self::Error> {
        let status = params
            .status
            .map(|s| split_list(&s).iter().map(|v| v.parse::<OrderStatusType>()).collect::<Result<Vec<_>, _>>())
            .transpose()
            .map_err(|e| e.to_string())?;
        Ok(OrderQueryFilter {
            order_number: params.order_number,
            customer_wallet: params.customer_wallet,
            since: params.since,
            until: params.until,
            status,
            awaiting_review: params.awaiting_review,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentResultStatus {
    Paid,
    HeldForReview,
    AlreadyRecorded,
}

/// The response to a payment confirmation webhook call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub result: PaymentResultStatus,
    pub order: Order,
}

impl From<PaymentOutcome> for PaymentResult {
    fn from(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Paid(order) => Self { result: PaymentResultStatus::Paid, order },
            PaymentOutcome::HeldForReview(order) => Self { result: PaymentResultStatus::HeldForReview, order },
            PaymentOutcome::AlreadyRecorded(order) => Self { result: PaymentResultStatus::AlreadyRecorded, order },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn search_params_to_filter() {
        let params = OrderSearchParams { status: Some("pending, TIMEOUT".into()), ..Default::default() };
        let filter = OrderQueryFilter::try_from(params).unwrap();
        assert_eq!(filter.status, Some(vec![OrderStatusType::Pending, OrderStatusType::Timeout]));
        assert!(!filter.awaiting_review);

        let params = OrderSearchParams { status: Some("pending,shipped".into()), ..Default::default() };
        assert!(OrderQueryFilter::try_from(params).is_err());

        let filter = OrderQueryFilter::try_from(OrderSearchParams::default()).unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn resolve_params_from_json() {
        let params: ResolveDiscrepancyParams =
            serde_json::from_str(r#"{"order_id":"ord-1","decision":"approve"}"#).unwrap();
        assert_eq!(params.decision, DiscrepancyDecision::Approve);
        assert!(params.notes.is_empty());
    }
}
