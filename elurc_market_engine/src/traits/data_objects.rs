use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{PaymentDiscrepancy, ProductId};

/// Payment-related fields written alongside a status change. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderUpdate {
    pub transaction_signature: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_discrepancy: Option<PaymentDiscrepancy>,
}

impl OrderUpdate {
    pub fn with_signature<S: Into<String>>(mut self, signature: S) -> Self {
        self.transaction_signature = Some(signature.into());
        self
    }

    pub fn with_paid_at(mut self, paid_at: DateTime<Utc>) -> Self {
        self.paid_at = Some(paid_at);
        self
    }

    pub fn with_discrepancy(mut self, discrepancy: PaymentDiscrepancy) -> Self {
        self.payment_discrepancy = Some(discrepancy);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_signature.is_none() && self.paid_at.is_none() && self.payment_discrepancy.is_none()
    }
}

/// Reported when an order cannot be fulfilled from the current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub product_id: ProductId,
    pub requested: i64,
    pub available: i64,
}
