//! Read-only access to orders, for the storefront, pollers and the admin dashboard.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Order, OrderId, StatusLogEntry},
    market_api::order_objects::{OrderQueryFilter, OrderStatusSummary},
    traits::{OrderApiError, OrderManagement},
};

pub struct OrderQueryApi<B> {
    db: B,
}

impl<B: Debug> Debug for OrderQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderQueryApi ({:?})", self.db)
    }
}

impl<B> OrderQueryApi<B>
where B: OrderManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderApiError> {
        self.db.fetch_order_by_id(order_id).await
    }

    pub async fn order_by_number(&self, order_number: &str) -> Result<Option<Order>, OrderApiError> {
        self.db.fetch_order_by_number(order_number).await
    }

    /// The compact status view served to payment pollers.
    pub async fn order_status(&self, order_id: &OrderId) -> Result<Option<OrderStatusSummary>, OrderApiError> {
        let order = self.db.fetch_order_by_id(order_id).await?;
        trace!("🗃️ Status poll for order {order_id}: {:?}", order.as_ref().map(|o| o.status));
        Ok(order.map(OrderStatusSummary::from))
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError> {
        if let (Some(since), Some(until)) = (query.since, query.until) {
            if since > until {
                return Err(OrderApiError::QueryError(format!("'since' ({since}) is after 'until' ({until})")));
            }
        }
        debug!("🗃️ Searching orders. {query}");
        self.db.search_orders(query).await
    }

    pub async fn status_history(&self, order_id: &OrderId) -> Result<Vec<StatusLogEntry>, OrderApiError> {
        self.db.fetch_status_history(order_id).await
    }
}
