//! # Storage backends
//!
//! This module defines the contracts that a database backend must satisfy to drive the marketplace.
//!
//! * [`OrderManagement`] provides read access to orders and their status history.
//! * [`CatalogManagement`] manages the product catalog and its stock levels.
//! * [`MarketplaceDatabase`] is the highest level of behaviour. It performs every multi-row write that the order
//!   lifecycle needs, such as inserting an order with its items, or changing an order's status together with the
//!   inventory movements and the audit trail that go with it. Implementations must make each of these calls atomic.
mod catalog_management;
mod data_objects;
mod marketplace_database;
mod order_management;

pub use catalog_management::{CatalogApiError, CatalogManagement};
pub use data_objects::{OrderUpdate, StockShortfall};
pub use marketplace_database::{MarketplaceDatabase, MarketplaceError};
pub use order_management::{OrderApiError, OrderManagement};
