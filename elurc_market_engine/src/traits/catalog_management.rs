use thiserror::Error;

use crate::db_types::{NewProduct, Product, ProductId};

#[derive(Debug, Clone, Error)]
pub enum CatalogApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(String),
    #[error("A product with slug '{0}' already exists")]
    SlugAlreadyExists(String),
    #[error("Invalid product: {0}")]
    InvalidProduct(String),
    #[error("Stock cannot be negative (requested {0})")]
    NegativeStock(i64),
}

impl From<sqlx::Error> for CatalogApiError {
    fn from(e: sqlx::Error) -> Self {
        CatalogApiError::DatabaseError(e.to_string())
    }
}

/// Management of the product catalog.
///
/// Implementations must keep `in_stock` equal to `stock > 0` after every stock change.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, CatalogApiError>;

    async fn fetch_product_by_slug(&self, slug: &str) -> Result<Option<Product>, CatalogApiError>;

    /// Lists the catalog ordered by name. If `only_in_stock` is set, sold-out products are left out.
    async fn fetch_products(&self, only_in_stock: bool) -> Result<Vec<Product>, CatalogApiError>;

    async fn insert_product(&self, product: NewProduct) -> Result<Product, CatalogApiError>;

    /// Overwrites the stock level of a product. Negative values are rejected.
    async fn set_stock(&self, product_id: &ProductId, stock: i64) -> Result<Product, CatalogApiError>;
}
