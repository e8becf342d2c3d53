//! ELURC Market Engine
//!
//! The engine holds the order lifecycle and payment reconciliation logic of the ELURC grocery marketplace. Orders are
//! priced in ELURC, and the engine tracks each one from checkout to fulfilment: it ties a confirmed blockchain
//! transaction to its order, flags payments that do not match the order total, and keeps the catalog's stock in step
//! with what has actually been shipped.
//!
//! The library is divided into three main sections:
//! 1. Storage backends ([`mod@traits`] and the SQLite implementation, [`SqliteDatabase`]). Backends implement the
//!    traits and never need to know about the state machine that drives them.
//! 2. The public API ([`OrderFlowApi`], [`OrderQueryApi`] and [`CatalogApi`]). Servers and tools should only go through
//!    these.
//! 3. Lifecycle [`events`], which other components can hook into, e.g. to send customer notifications.
pub mod db_types;
pub mod events;
pub mod helpers;
mod market_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "test_utils")]
pub mod test_utils;

pub use market_api::{
    catalog_api::CatalogApi,
    discrepancy,
    order_flow_api::{OrderFlowApi, OrderFlowOptions, DEFAULT_PAYMENT_TIMEOUT_MINUTES, DEFAULT_UNDERPAYMENT_TOLERANCE},
    order_objects,
    order_query_api::OrderQueryApi,
    transitions,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    CatalogApiError,
    CatalogManagement,
    MarketplaceDatabase,
    MarketplaceError,
    OrderApiError,
    OrderManagement,
};
