use chrono::{TimeZone, Utc};
use elurc_common::{EuroCents, Lamports};
use elurc_market_engine::{
    db_types::{
        NewProduct,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        PaymentDiscrepancy,
        Product,
        ProductId,
        StatusLogEntry,
    },
    order_objects::OrderQueryFilter,
    test_utils::prepare_env::{test_address, TEST_WALLET},
    traits::{CatalogApiError, CatalogManagement, OrderApiError, OrderManagement},
};
use mockall::mock;

mock! {
    pub OrderManager {}
    impl OrderManagement for OrderManager {
        async fn fetch_order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderApiError>;
        async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, OrderApiError>;
        async fn fetch_order_by_signature(&self, signature: &str) -> Result<Option<Order>, OrderApiError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError>;
        async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<StatusLogEntry>, OrderApiError>;
    }
}

mock! {
    pub CatalogManager {}
    impl CatalogManagement for CatalogManager {
        async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, CatalogApiError>;
        async fn fetch_product_by_slug(&self, slug: &str) -> Result<Option<Product>, CatalogApiError>;
        async fn fetch_products(&self, only_in_stock: bool) -> Result<Vec<Product>, CatalogApiError>;
        async fn insert_product(&self, product: NewProduct) -> Result<Product, CatalogApiError>;
        async fn set_stock(&self, product_id: &ProductId, stock: i64) -> Result<Product, CatalogApiError>;
    }
}

pub fn sample_product(slug: &str, stock: i64) -> Product {
    let ts = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
    Product {
        id: ProductId::from(format!("prod-{slug}").as_str()),
        name: slug.replace('-', " "),
        slug: slug.into(),
        price_elurc: Lamports::from(2_000_000),
        price_eur: EuroCents::from(199),
        stock,
        in_stock: stock > 0,
        category: Some("grocery".into()),
        images: vec![],
        created_at: ts,
        updated_at: ts,
    }
}

pub fn sample_order(id: &str, status: OrderStatusType) -> Order {
    let ts = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
    Order {
        id: OrderId::from(id),
        order_number: "ELR-20240309-K3J9QX".into(),
        status,
        amount_elurc: Lamports::from(4_000_000),
        amount_eur: EuroCents::from(398),
        customer_wallet: TEST_WALLET.into(),
        shipping_address: test_address(),
        items: vec![OrderItem {
            product_id: ProductId::from("prod-organic-apples"),
            product_name: "Organic apples".into(),
            quantity: 2,
            price_elurc: Lamports::from(2_000_000),
            price_eur: EuroCents::from(199),
        }],
        transaction_signature: None,
        paid_at: None,
        payment_discrepancy: PaymentDiscrepancy::default(),
        admin_notes: None,
        created_at: ts,
        updated_at: ts,
    }
}
