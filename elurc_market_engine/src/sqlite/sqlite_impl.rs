//! `SqliteDatabase` is the SQLite implementation of the marketplace storage traits.
use std::{collections::BTreeMap, fmt::Debug};

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{db_url, new_pool, orders, products, status_log};
use crate::{
    db_types::{NewOrder, NewProduct, Order, OrderId, OrderItem, OrderStatusType, Product, ProductId, StatusLogEntry},
    market_api::transitions::{InventoryEffect, StatusTransition},
    order_objects::OrderQueryFilter,
    traits::{
        CatalogApiError,
        CatalogManagement,
        MarketplaceDatabase,
        MarketplaceError,
        OrderApiError,
        OrderManagement,
        OrderUpdate,
        StockShortfall,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Connects to the database named by `ELURC_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Sums the quantities per product, so that an order listing a product twice is checked against its total.
fn quantities_by_product(items: &[OrderItem]) -> BTreeMap<ProductId, i64> {
    let mut totals = BTreeMap::new();
    for item in items {
        *totals.entry(item.product_id.clone()).or_insert(0) += item.quantity;
    }
    totals
}

/// Takes the stock for every item out of the catalog. All items are checked before any is decremented.
async fn commit_inventory(items: &[OrderItem], conn: &mut SqliteConnection) -> Result<(), MarketplaceError> {
    let totals = quantities_by_product(items);
    for (product_id, &requested) in &totals {
        let product = products::fetch_product(product_id, conn)
            .await?
            .ok_or_else(|| MarketplaceError::ProductNotFound(product_id.clone()))?;
        if product.stock < requested {
            return Err(MarketplaceError::InsufficientStock(StockShortfall {
                product_id: product_id.clone(),
                requested,
                available: product.stock,
            }));
        }
    }
    for (product_id, requested) in totals {
        if !products::adjust_stock(&product_id, -requested, conn).await? {
            // Only reachable if another writer got in between the check and the update
            return Err(MarketplaceError::InsufficientStock(StockShortfall {
                product_id,
                requested,
                available: 0,
            }));
        }
    }
    Ok(())
}

/// Puts the stock for every item back into the catalog.
async fn release_inventory(items: &[OrderItem], conn: &mut SqliteConnection) -> Result<(), MarketplaceError> {
    for (product_id, quantity) in quantities_by_product(items) {
        if !products::adjust_stock(&product_id, quantity, conn).await? {
            return Err(MarketplaceError::ProductNotFound(product_id));
        }
    }
    Ok(())
}

fn map_signature_conflict(e: sqlx::Error, update: &OrderUpdate) -> MarketplaceError {
    let is_unique_violation = e.as_database_error().map(|d| d.is_unique_violation()).unwrap_or(false);
    match (&update.transaction_signature, is_unique_violation) {
        (Some(signature), true) => MarketplaceError::SignatureAlreadyUsed(signature.clone()),
        _ => MarketplaceError::from(e),
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(order_number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_signature(&self, signature: &str) -> Result<Option<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_signature(signature, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<StatusLogEntry>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let history = status_log::fetch_history(order_id, &mut conn).await?;
        Ok(history)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_product_by_slug(&self, slug: &str) -> Result<Option<Product>, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product_by_slug(slug, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_products(&self, only_in_stock: bool) -> Result<Vec<Product>, CatalogApiError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products(only_in_stock, &mut conn).await?;
        Ok(products)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, CatalogApiError> {
        if product.stock < 0 {
            return Err(CatalogApiError::NegativeStock(product.stock));
        }
        let slug = product.slug.clone();
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await.map_err(|e| {
            if e.as_database_error().map(|d| d.is_unique_violation()).unwrap_or(false) {
                CatalogApiError::SlugAlreadyExists(slug)
            } else {
                CatalogApiError::from(e)
            }
        })
    }

    async fn set_stock(&self, product_id: &ProductId, stock: i64) -> Result<Product, CatalogApiError> {
        if stock < 0 {
            return Err(CatalogApiError::NegativeStock(stock));
        }
        let mut conn = self.pool.acquire().await?;
        products::set_stock(product_id, stock, &mut conn)
            .await?
            .ok_or_else(|| CatalogApiError::ProductNotFound(product_id.to_string()))
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        orders::insert_order(&order, &mut tx).await?;
        status_log::insert_entry(&order.id, None, OrderStatusType::Pending, "Order placed", &mut tx).await?;
        let inserted = orders::fetch_order_by_id(&order.id, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::OrderNotFound(order.id.clone()))?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn apply_status_transition(
        &self,
        order_id: &OrderId,
        transition: StatusTransition,
        update: OrderUpdate,
        reason: &str,
    ) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))?;
        if order.status != transition.from {
            return Err(MarketplaceError::StatusChangedConcurrently(order_id.clone()));
        }
        match transition.inventory {
            InventoryEffect::Commit => commit_inventory(&order.items, &mut tx).await?,
            InventoryEffect::Release => release_inventory(&order.items, &mut tx).await?,
            InventoryEffect::None => {},
        }
        if !update.is_empty() {
            orders::update_payment_details(order_id, transition.from, &update, &mut tx)
                .await
                .map_err(|e| map_signature_conflict(e, &update))?;
        }
        if !orders::update_status(order_id, transition.from, transition.to, &mut tx).await? {
            return Err(MarketplaceError::StatusChangedConcurrently(order_id.clone()));
        }
        status_log::insert_entry(order_id, Some(transition.from), transition.to, reason, &mut tx).await?;
        let updated = orders::fetch_order_by_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} moved from {} to {}", transition.from, transition.to);
        Ok(updated)
    }

    async fn update_payment_details(
        &self,
        order_id: &OrderId,
        expected_status: OrderStatusType,
        update: OrderUpdate,
    ) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::update_payment_details(order_id, expected_status, &update, &mut tx)
            .await
            .map_err(|e| map_signature_conflict(e, &update))?;
        if !updated {
            return match orders::fetch_order_by_id(order_id, &mut tx).await? {
                Some(_) => Err(MarketplaceError::StatusChangedConcurrently(order_id.clone())),
                None => Err(MarketplaceError::OrderNotFound(order_id.clone())),
            };
        }
        let order = orders::fetch_order_by_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn expire_pending_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let candidates = orders::fetch_expirable_orders(cutoff, &mut tx).await?;
        let mut expired = Vec::with_capacity(candidates.len());
        for order in candidates {
            if orders::update_status(&order.id, OrderStatusType::Pending, OrderStatusType::Timeout, &mut tx).await? {
                let reason = "Payment window elapsed";
                status_log::insert_entry(
                    &order.id,
                    Some(OrderStatusType::Pending),
                    OrderStatusType::Timeout,
                    reason,
                    &mut tx,
                )
                .await?;
                if let Some(order) = orders::fetch_order_by_id(&order.id, &mut tx).await? {
                    expired.push(order);
                }
            }
        }
        tx.commit().await?;
        if !expired.is_empty() {
            info!("🗃️ {} pending orders timed out", expired.len());
        }
        Ok(expired)
    }

    async fn update_admin_notes(&self, order_id: &OrderId, notes: &str) -> Result<Order, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        if !orders::update_admin_notes(order_id, notes, &mut conn).await? {
            return Err(MarketplaceError::OrderNotFound(order_id.clone()));
        }
        orders::fetch_order_by_id(order_id, &mut conn)
            .await?
            .ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))
    }

    async fn close(&mut self) -> Result<(), MarketplaceError> {
        self.pool.close().await;
        Ok(())
    }
}
