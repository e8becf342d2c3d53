use thiserror::Error;

use crate::{
    db_types::{Order, OrderId, StatusLogEntry},
    order_objects::OrderQueryFilter,
};

#[derive(Debug, Clone, Error)]
pub enum OrderApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for OrderApiError {
    fn from(e: sqlx::Error) -> Self {
        OrderApiError::DatabaseError(e.to_string())
    }
}

/// Read access to orders.
///
/// Order records are never deleted, so every lookup here is stable once an order exists. Writes go through
/// [`crate::traits::MarketplaceDatabase`].
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderApiError>;

    /// Fetches an order by its human-readable number, e.g. `ELR-20240309-K3J9QX`.
    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, OrderApiError>;

    /// Fetches the order that a blockchain transaction signature has been attached to, if any.
    async fn fetch_order_by_signature(&self, signature: &str) -> Result<Option<Order>, OrderApiError>;

    /// Returns all orders matching the filter, oldest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError>;

    /// Returns the audit trail of status changes for the order, oldest first.
    async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<StatusLogEntry>, OrderApiError>;
}
