use elurc_common::{EuroCents, Lamports};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    db_types::{NewProduct, Product, ShippingAddress},
    order_objects::{OrderLineRequest, OrderRequest},
    traits::{CatalogManagement, MarketplaceDatabase},
    SqliteDatabase,
};

pub const TEST_WALLET: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

/// Loads `.env.test` if present, initialises logging and makes sure no database is left over at `url`.
pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if Sqlite::database_exists(url).await.unwrap_or(false) {
        if let Err(e) = Sqlite::drop_database(url).await {
            warn!("🚀️ Error dropping database {url}: {e:?}");
        }
    }
    debug!("🚀️ Test environment ready for {url}");
}

/// A fresh SQLite file in the system temp directory.
pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/elurc_test_{}.db", dir.display(), rand::random::<u64>())
}

/// Creates a database at a random location, with migrations applied.
pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database")
}

pub async fn drop_test_db(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.pool().close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Error dropping database {url}: {e:?}");
    }
}

pub fn test_address() -> ShippingAddress {
    ShippingAddress {
        name: "Marie Dubois".into(),
        line1: "12 Rue des Halles".into(),
        line2: None,
        city: "Lyon".into(),
        postal_code: "69001".into(),
        country: "FR".into(),
        phone: Some("+33 4 00 00 00 00".into()),
    }
}

/// Adds three products to the catalog: apples (price 2 ELURC, 10 in stock), bread (4.5 ELURC, 3 in stock) and
/// saffron (25 ELURC, sold out).
pub async fn seed_catalog<B: CatalogManagement>(db: &B) -> Vec<Product> {
    let products = [
        ("Organic apples", "organic-apples", 2_000_000, 199, 10),
        ("Sourdough bread", "sourdough-bread", 4_500_000, 450, 3),
        ("Saffron threads", "saffron-threads", 25_000_000, 2500, 0),
    ];
    let mut result = Vec::with_capacity(products.len());
    for (name, slug, elurc, eur, stock) in products {
        let product = NewProduct {
            name: name.into(),
            slug: slug.into(),
            price_elurc: Lamports::from(elurc),
            price_eur: EuroCents::from(eur),
            stock,
            category: Some("grocery".into()),
            images: vec![format!("https://cdn.example.com/{slug}.jpg")],
        };
        result.push(db.insert_product(product).await.expect("Error seeding catalog"));
    }
    result
}

pub fn order_request(lines: &[(&Product, i64)]) -> OrderRequest {
    OrderRequest {
        customer_wallet: TEST_WALLET.into(),
        shipping_address: test_address(),
        items: lines
            .iter()
            .map(|(p, quantity)| OrderLineRequest { product_id: p.id.clone(), quantity: *quantity })
            .collect(),
    }
}
