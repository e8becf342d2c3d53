//! # ELURC Market server
//! This crate hosts the HTTP server for the ELURC grocery marketplace. It is responsible for:
//! Serving the product catalog and accepting checkouts from the storefront.
//! Receiving payment confirmations from the ledger verifier and handing them to the order flow engine.
//! Exposing the admin back office: order search, fulfilment, cancellation and discrepancy review.
//! Timing out orders that were never paid.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/products`, `/product/{slug}`: The public catalog.
//! * `/order`, `/order/{id}`, `/order/{id}/status`: Checkout, order lookup and the payment poller endpoint.
//! * `/webhook/payment_confirmed`: Payment confirmations from the ledger verifier. Protected by an HMAC signature
//!   and an optional IP whitelist.
//! * `/api/*`: Admin routes. Every request must carry the admin API key.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod middleware;
pub mod notifications;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
