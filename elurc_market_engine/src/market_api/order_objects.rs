use std::fmt::Display;

use chrono::{DateTime, Utc};
use elurc_common::Lamports;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderId, OrderStatusType, PaymentDiscrepancy, ProductId, ShippingAddress},
    traits::OrderApiError,
};

//--------------------------------------    OrderQueryFilter   ---------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_number: Option<String>,
    pub customer_wallet: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
    /// Only return orders with an underpayment awaiting an admin decision.
    #[serde(default)]
    pub awaiting_review: bool,
}

impl OrderQueryFilter {
    pub fn with_order_number<S: Into<String>>(mut self, order_number: S) -> Self {
        self.order_number = Some(order_number.into());
        self
    }

    pub fn with_customer_wallet<S: Into<String>>(mut self, wallet: S) -> Self {
        self.customer_wallet = Some(wallet.into());
        self
    }

    pub fn since<T>(mut self, since: T) -> Result<Self, OrderApiError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = since.try_into().map_err(|e| OrderApiError::QueryError(e.to_string()))?;
        self.since = Some(dt);
        Ok(self)
    }

    pub fn until<T>(mut self, until: T) -> Result<Self, OrderApiError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = until.try_into().map_err(|e| OrderApiError::QueryError(e.to_string()))?;
        self.until = Some(dt);
        Ok(self)
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn awaiting_review(mut self) -> Self {
        self.awaiting_review = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_number.is_none() &&
            self.customer_wallet.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.status.is_none() &&
            !self.awaiting_review
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if let Some(number) = &self.order_number {
            write!(f, "order_number: {number}. ")?;
        }
        if let Some(wallet) = &self.customer_wallet {
            write!(f, "wallet: {wallet}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        if self.awaiting_review {
            write!(f, "awaiting review. ")?;
        }
        Ok(())
    }
}

//--------------------------------------      OrderRequest     ---------------------------------------------------------
/// A checkout request as submitted by the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub customer_wallet: String,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

//--------------------------------------  PaymentConfirmation  ---------------------------------------------------------
/// A transaction that the ledger verifier has seen settle on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub order_id: OrderId,
    pub transaction_signature: String,
    pub amount_received: Lamports,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOutcome {
    /// The payment settled the order.
    Paid(Order),
    /// The payment was recorded, but the order waits for an admin to review the shortfall.
    HeldForReview(Order),
    /// This exact confirmation was processed before. Nothing changed.
    AlreadyRecorded(Order),
}

impl PaymentOutcome {
    pub fn order(&self) -> &Order {
        match self {
            PaymentOutcome::Paid(o) | PaymentOutcome::HeldForReview(o) | PaymentOutcome::AlreadyRecorded(o) => o,
        }
    }
}

//--------------------------------------  DiscrepancyDecision  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscrepancyDecision {
    Approve,
    Reject,
}

impl Display for DiscrepancyDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscrepancyDecision::Approve => write!(f, "approve"),
            DiscrepancyDecision::Reject => write!(f, "reject"),
        }
    }
}

//--------------------------------------   OrderStatusSummary  ---------------------------------------------------------
/// The compact view of an order returned to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusSummary {
    pub order_id: OrderId,
    pub order_number: String,
    pub status: OrderStatusType,
    pub amount_elurc: Lamports,
    pub transaction_signature: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub awaiting_review: bool,
    pub payment_discrepancy: PaymentDiscrepancy,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderStatusSummary {
    fn from(order: Order) -> Self {
        Self {
            awaiting_review: order.is_awaiting_review(),
            order_id: order.id,
            order_number: order.order_number,
            status: order.status,
            amount_elurc: order.amount_elurc,
            transaction_signature: order.transaction_signature,
            paid_at: order.paid_at,
            payment_discrepancy: order.payment_discrepancy,
            updated_at: order.updated_at,
        }
    }
}
