//! # SQLite database methods
//!
//! Plain functions that accept a `&mut SqliteConnection`. Callers pass a pooled connection for single statements, or
//! `&mut tx` when several calls must succeed or fail together.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, Sqlite, SqlitePool};

pub mod orders;
pub mod products;
pub mod status_log;

const SQLITE_DB_URL: &str = "sqlite://data/elurc_market.db";

pub fn db_url() -> String {
    let result = env::var("ELURC_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ ELURC_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

/// Opens a connection pool, creating the database file if needed, and brings the schema up to date.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    use sqlx::migrate::MigrateDatabase;
    if !Sqlite::database_exists(url).await.unwrap_or(false) {
        info!("🗃️ Creating new database at {url}");
        Sqlite::create_database(url).await?;
    }
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    sqlx::migrate!("./src/sqlite/migrations").run(&pool).await?;
    Ok(pool)
}

pub(crate) fn decode_error<E>(column: &str, e: E) -> SqlxError
where E: std::error::Error + Send + Sync + 'static {
    SqlxError::ColumnDecode { index: column.to_string(), source: Box::new(e) }
}
