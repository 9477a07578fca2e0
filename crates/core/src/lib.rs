//! Ventas Core - domain types and rules.
//!
//! This crate holds everything about the shop that can be decided without
//! I/O: identifiers, money, roles, the cart aggregate, the invoice state
//! machine and checkout planning. The `server` crate loads state from
//! `PostgreSQL`, asks this crate what should happen, and writes the result.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, email, roles and statuses
//! - [`access`] - Role policy shared by every guarded route
//! - [`cart`] - Cart aggregate with total reconciliation
//! - [`invoice`] - Invoices, status transitions and stock restoration
//! - [`checkout`] - Stock validation and pricing for new invoices
//! - [`catalog`] - Category/product field rules and search patterns

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod access;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod invoice;
pub mod types;

pub use types::*;
