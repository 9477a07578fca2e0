//! Ventas e-commerce backend.
//!
//! HTTP API over PostgreSQL for accounts, catalog, carts, invoices and
//! checkout. The domain rules live in `ventas-core`; this crate adds
//! persistence, authentication and the HTTP surface.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::app;
