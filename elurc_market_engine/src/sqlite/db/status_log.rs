use chrono::Utc;
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use super::decode_error;
use crate::db_types::{OrderId, OrderStatusType, StatusLogEntry};

impl<'r> FromRow<'r, SqliteRow> for StatusLogEntry {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let old_status = row
            .try_get::<Option<String>, _>("old_status")?
            .map(|s| s.parse::<OrderStatusType>())
            .transpose()
            .map_err(|e| decode_error("old_status", e))?;
        let new_status =
            row.try_get::<String, _>("new_status")?.parse().map_err(|e| decode_error("new_status", e))?;
        Ok(Self {
            order_id: OrderId(row.try_get("order_id")?),
            old_status,
            new_status,
            reason: row.try_get("reason")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

pub async fn insert_entry(
    order_id: &OrderId,
    old_status: Option<OrderStatusType>,
    new_status: OrderStatusType,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_status_log (order_id, old_status, new_status, reason, created_at) VALUES ($1, $2, $3, $4, \
         $5)",
    )
    .bind(order_id.as_str())
    .bind(old_status.map(|s| s.as_str()))
    .bind(new_status.as_str())
    .bind(reason)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_history(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<StatusLogEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_status_log WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}
