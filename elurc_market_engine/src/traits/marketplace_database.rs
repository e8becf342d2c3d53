use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, ProductId},
    market_api::transitions::{StatusTransition, TransitionError},
    traits::{
        data_objects::{OrderUpdate, StockShortfall},
        CatalogApiError,
        CatalogManagement,
        OrderApiError,
        OrderManagement,
    },
};

/// The highest level of behaviour for marketplace backends.
///
/// Every method here touches more than one row and must either apply completely or not at all.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone + OrderManagement + CatalogManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order and its line items with status `Pending`, and writes the first entry of its status log.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, MarketplaceError>;

    /// Moves an order along a transition that has already been approved by [`StatusTransition::check`].
    ///
    /// In a single transaction, the implementation must
    /// * verify that the order is still in `transition.from`, returning
    ///   [`MarketplaceError::StatusChangedConcurrently`] otherwise,
    /// * apply the transition's inventory effect to every line item. When committing stock, availability is
    ///   checked for *all* items before any of them is decremented, and a shortfall aborts the whole call with
    ///   [`MarketplaceError::InsufficientStock`],
    /// * write the new status along with any fields in `update`,
    /// * append an entry to the status log with the given reason.
    async fn apply_status_transition(
        &self,
        order_id: &OrderId,
        transition: StatusTransition,
        update: OrderUpdate,
        reason: &str,
    ) -> Result<Order, MarketplaceError>;

    /// Writes payment fields without changing the order status, provided the order is still in `expected_status`.
    async fn update_payment_details(
        &self,
        order_id: &OrderId,
        expected_status: OrderStatusType,
        update: OrderUpdate,
    ) -> Result<Order, MarketplaceError>;

    /// Moves every `Pending` order whose latest move into `Pending` happened before `cutoff` to `Timeout`. Orders with
    /// an underpayment awaiting review are left alone. Returns the orders that were expired.
    async fn expire_pending_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, MarketplaceError>;

    /// Replaces the free-text admin notes on an order. Does not affect its status.
    async fn update_admin_notes(&self, order_id: &OrderId, notes: &str) -> Result<Order, MarketplaceError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MarketplaceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Product {0} does not exist")]
    ProductNotFound(ProductId),
    #[error("{0}")]
    Transition(#[from] TransitionError),
    #[error("Order {0} changed status while it was being updated. Please retry.")]
    StatusChangedConcurrently(OrderId),
    #[error("Not enough stock of product {}: {} requested, {} available", .0.product_id, .0.requested, .0.available)]
    InsufficientStock(StockShortfall),
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
    #[error("Invalid wallet address: {0}")]
    InvalidWalletAddress(String),
    #[error("Invalid payment: {0}")]
    InvalidPayment(String),
    #[error("Transaction signature {0} has already been used to pay for another order")]
    SignatureAlreadyUsed(String),
    #[error("Order {0} already has a different payment attached to it")]
    PaymentAlreadyRecorded(OrderId),
    #[error("Order {0} cannot accept a payment in its current status ({1})")]
    PaymentNotAccepted(OrderId, OrderStatusType),
    #[error("Order {0} has no payment discrepancy awaiting review")]
    NoPendingDiscrepancy(OrderId),
    #[error("Order {0} has an underpayment awaiting review. Resolve the discrepancy instead.")]
    AwaitingDiscrepancyReview(OrderId),
    #[error("{0}")]
    OrderError(#[from] OrderApiError),
    #[error("{0}")]
    CatalogError(#[from] CatalogApiError),
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        MarketplaceError::DatabaseError(e.to_string())
    }
}
