use chrono::Utc;
use elurc_common::{EuroCents, Lamports};
use log::trace;
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use super::decode_error;
use crate::db_types::{NewProduct, Product, ProductId};

impl<'r> FromRow<'r, SqliteRow> for Product {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let images: String = row.try_get("images")?;
        let images = serde_json::from_str(&images).map_err(|e| decode_error("images", e))?;
        Ok(Self {
            id: ProductId(row.try_get("id")?),
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            price_elurc: Lamports::from(row.try_get::<i64, _>("price_elurc")?),
            price_eur: EuroCents::from(row.try_get::<i64, _>("price_eur")?),
            stock: row.try_get("stock")?,
            in_stock: row.try_get("in_stock")?,
            category: row.try_get("category")?,
            images,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

pub async fn fetch_product(id: &ProductId, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await
}

pub async fn fetch_product_by_slug(slug: &str, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE slug = $1").bind(slug).fetch_optional(conn).await
}

pub async fn fetch_products(only_in_stock: bool, conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    let sql = if only_in_stock {
        "SELECT * FROM products WHERE in_stock = TRUE ORDER BY name ASC"
    } else {
        "SELECT * FROM products ORDER BY name ASC"
    };
    sqlx::query_as(sql).fetch_all(conn).await
}

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, sqlx::Error> {
    let images = serde_json::to_string(&product.images).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    let now = Utc::now();
    let product = sqlx::query_as(
        r#"
            INSERT INTO products (id, name, slug, price_elurc, price_eur, stock, in_stock, category, images, created_at,
            updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *;
        "#,
    )
    .bind(ProductId::random().as_str())
    .bind(product.name)
    .bind(product.slug)
    .bind(product.price_elurc.value())
    .bind(product.price_eur.value())
    .bind(product.stock)
    .bind(product.stock > 0)
    .bind(product.category)
    .bind(images)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

/// Overwrites the stock level. Returns `None` if the product does not exist.
pub async fn set_stock(
    id: &ProductId,
    stock: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE products SET stock = $1, in_stock = $2, updated_at = $3 WHERE id = $4 RETURNING *",
    )
    .bind(stock)
    .bind(stock > 0)
    .bind(Utc::now())
    .bind(id.as_str())
    .fetch_optional(conn)
    .await
}

/// Adds `delta` (which may be negative) to the stock of a product, keeping `in_stock` in sync.
///
/// Returns `false` without touching the row if the product does not exist, or if the change would take the stock
/// below zero.
pub async fn adjust_stock(id: &ProductId, delta: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE products
            SET stock = stock + $1, in_stock = (stock + $1) > 0, updated_at = $2
            WHERE id = $3 AND stock + $1 >= 0
        "#,
    )
    .bind(delta)
    .bind(Utc::now())
    .bind(id.as_str())
    .execute(conn)
    .await?;
    trace!("🗃️ Adjusted stock of {id} by {delta}. {} rows affected", result.rows_affected());
    Ok(result.rows_affected() == 1)
}
