use chrono::{DateTime, Utc};
use elurc_common::{EuroCents, Lamports};
use log::{debug, trace};
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Row, Sqlite, SqliteConnection};

use super::decode_error;
use crate::{
    db_types::{
        DiscrepancyResolution,
        DiscrepancyType,
        NewOrder,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        PaymentDiscrepancy,
        ProductId,
        ShippingAddress,
    },
    order_objects::OrderQueryFilter,
    traits::OrderUpdate,
};

/// Decodes an order row. Line items live in their own table, so `items` is left empty here and filled in by
/// [`attach_items`].
impl<'r> FromRow<'r, SqliteRow> for Order {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status = row.try_get::<String, _>("status")?.parse().map_err(|e| decode_error("status", e))?;
        let discrepancy_type = row
            .try_get::<Option<String>, _>("discrepancy_type")?
            .map(|s| s.parse::<DiscrepancyType>())
            .transpose()
            .map_err(|e| decode_error("discrepancy_type", e))?;
        let resolution = row
            .try_get::<Option<String>, _>("discrepancy_resolution")?
            .map(|s| s.parse::<DiscrepancyResolution>())
            .transpose()
            .map_err(|e| decode_error("discrepancy_resolution", e))?;
        let shipping_address = ShippingAddress {
            name: row.try_get("ship_name")?,
            line1: row.try_get("ship_line1")?,
            line2: row.try_get("ship_line2")?,
            city: row.try_get("ship_city")?,
            postal_code: row.try_get("ship_postal_code")?,
            country: row.try_get("ship_country")?,
            phone: row.try_get("ship_phone")?,
        };
        let payment_discrepancy = PaymentDiscrepancy {
            has_discrepancy: row.try_get("has_discrepancy")?,
            discrepancy_type,
            difference_amount: Lamports::from(row.try_get::<i64, _>("difference_amount")?),
            received_amount: row.try_get::<Option<i64>, _>("received_amount")?.map(Lamports::from),
            resolution,
            resolution_notes: row.try_get("resolution_notes")?,
        };
        Ok(Self {
            id: OrderId(row.try_get("id")?),
            order_number: row.try_get("order_number")?,
            status,
            amount_elurc: Lamports::from(row.try_get::<i64, _>("amount_elurc")?),
            amount_eur: EuroCents::from(row.try_get::<i64, _>("amount_eur")?),
            customer_wallet: row.try_get("customer_wallet")?,
            shipping_address,
            items: Vec::new(),
            transaction_signature: row.try_get("transaction_signature")?,
            paid_at: row.try_get("paid_at")?,
            payment_discrepancy,
            admin_notes: row.try_get("admin_notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for OrderItem {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            product_id: ProductId(row.try_get("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: row.try_get("quantity")?,
            price_elurc: Lamports::from(row.try_get::<i64, _>("price_elurc")?),
            price_eur: EuroCents::from(row.try_get::<i64, _>("price_eur")?),
        })
    }
}

/// Inserts the order and its line items. This is not atomic on its own; run it inside a transaction.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let address = &order.shipping_address;
    sqlx::query(
        r#"
            INSERT INTO orders (
                id,
                order_number,
                status,
                amount_elurc,
                amount_eur,
                customer_wallet,
                ship_name,
                ship_line1,
                ship_line2,
                ship_city,
                ship_postal_code,
                ship_country,
                ship_phone,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(order.id.as_str())
    .bind(&order.order_number)
    .bind(OrderStatusType::Pending.as_str())
    .bind(order.total_elurc().value())
    .bind(order.total_eur().value())
    .bind(&order.customer_wallet)
    .bind(&address.name)
    .bind(&address.line1)
    .bind(&address.line2)
    .bind(&address.city)
    .bind(&address.postal_code)
    .bind(&address.country)
    .bind(&address.phone)
    .bind(order.created_at)
    .bind(order.created_at)
    .execute(&mut *conn)
    .await?;
    for item in &order.items {
        sqlx::query(
            r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, price_elurc, price_eur)
                VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id.as_str())
        .bind(item.product_id.as_str())
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.price_elurc.value())
        .bind(item.price_eur.value())
        .execute(&mut *conn)
        .await?;
    }
    debug!("🗃️ Order {} inserted with {} items", order.order_number, order.items.len());
    Ok(())
}

pub async fn fetch_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}

async fn attach_items(order: Option<Order>, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    match order {
        Some(mut order) => {
            order.items = fetch_items(&order.id, conn).await?;
            Ok(Some(order))
        },
        None => Ok(None),
    }
}

pub async fn fetch_order_by_id(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(order_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    attach_items(order, conn).await
}

pub async fn fetch_order_by_number(number: &str, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_number = $1").bind(number).fetch_optional(&mut *conn).await?;
    attach_items(order, conn).await
}

pub async fn fetch_order_by_signature(
    signature: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE transaction_signature = $1")
        .bind(signature)
        .fetch_optional(&mut *conn)
        .await?;
    attach_items(order, conn).await
}

pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM orders WHERE 1 = 1");
    if let Some(number) = query.order_number {
        builder.push(" AND order_number = ").push_bind(number);
    }
    if let Some(wallet) = query.customer_wallet {
        builder.push(" AND customer_wallet = ").push_bind(wallet);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        builder.push(" AND status IN (");
        let mut separated = builder.separated(", ");
        for status in statuses {
            separated.push_bind(status.as_str());
        }
        separated.push_unseparated(")");
    }
    if let Some(since) = query.since {
        builder.push(" AND julianday(created_at) >= julianday(").push_bind(since).push(")");
    }
    if let Some(until) = query.until {
        builder.push(" AND julianday(created_at) <= julianday(").push_bind(until).push(")");
    }
    if query.awaiting_review {
        builder.push(" AND has_discrepancy = TRUE AND discrepancy_resolution = 'pending'");
    }
    builder.push(" ORDER BY created_at ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders: Vec<Order> = builder.build_query_as().fetch_all(&mut *conn).await?;
    let mut result = Vec::with_capacity(orders.len());
    for mut order in orders {
        order.items = fetch_items(&order.id, conn).await?;
        result.push(order);
    }
    Ok(result)
}

/// Sets the order status, but only if it is currently `from`. Returns `false` if no row matched.
pub async fn update_status(
    order_id: &OrderId,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4")
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(order_id.as_str())
        .bind(from.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Writes the payment fields that are set in `update`, provided the order is in `expected_status`. Returns `false` if
/// no row matched.
pub async fn update_payment_details(
    order_id: &OrderId,
    expected_status: OrderStatusType,
    update: &OrderUpdate,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET updated_at = ");
    builder.push_bind(Utc::now());
    if let Some(signature) = &update.transaction_signature {
        builder.push(", transaction_signature = ").push_bind(signature.clone());
    }
    if let Some(paid_at) = update.paid_at {
        builder.push(", paid_at = ").push_bind(paid_at);
    }
    if let Some(d) = &update.payment_discrepancy {
        builder.push(", has_discrepancy = ").push_bind(d.has_discrepancy);
        builder.push(", discrepancy_type = ").push_bind(d.discrepancy_type.map(|t| t.to_string()));
        builder.push(", difference_amount = ").push_bind(d.difference_amount.value());
        builder.push(", received_amount = ").push_bind(d.received_amount.map(|a| a.value()));
        builder.push(", discrepancy_resolution = ").push_bind(d.resolution.map(|r| r.to_string()));
        builder.push(", resolution_notes = ").push_bind(d.resolution_notes.clone());
    }
    builder.push(" WHERE id = ").push_bind(order_id.as_str().to_string());
    builder.push(" AND status = ").push_bind(expected_status.as_str());
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected() == 1)
}

pub async fn update_admin_notes(
    order_id: &OrderId,
    notes: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET admin_notes = $1, updated_at = $2 WHERE id = $3")
        .bind(notes)
        .bind(Utc::now())
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Pending orders whose payment window opened before `cutoff`, excluding those with an underpayment awaiting review.
///
/// The window opens at the most recent move into `pending`, so a reopened order gets a fresh one.
pub async fn fetch_expirable_orders(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders: Vec<Order> = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE status = 'pending' AND
            COALESCE(
                (SELECT MAX(julianday(l.created_at)) FROM order_status_log l
                 WHERE l.order_id = orders.id AND l.new_status = 'pending'),
                julianday(orders.created_at)
            ) < julianday($1)
        ORDER BY created_at ASC
        "#,
    )
    .bind(cutoff)
    .fetch_all(&mut *conn)
    .await?;
    let mut result = Vec::with_capacity(orders.len());
    for mut order in orders.into_iter().filter(|o| !o.is_awaiting_review()) {
        order.items = fetch_items(&order.id, conn).await?;
        result.push(order);
    }
    Ok(result)
}
