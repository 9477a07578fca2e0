//! Database operations for the Ventas `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users` - Accounts with Argon2 password hashes and roles
//! - `categories` - Product categories (unique name, soft-deleted)
//! - `products` - Catalog with stock and units-sold counters
//! - `carts` / `cart_lines` - One cart per user, lines with price snapshots
//! - `invoices` / `invoice_lines` - Billing records with price snapshots
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p ventas-cli -- migrate
//! ```
//!
//! # Transactions
//!
//! Repositories borrow the pool for single-statement work. Multi-table
//! workflows (checkout, cancellation, cart saves) use the free functions that
//! take a `&mut PgConnection`, so the caller decides the transaction scope.

pub mod carts;
pub mod categories;
pub mod invoices;
pub mod products;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use categories::CategoryRepository;
pub use invoices::InvoiceRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, keeping other errors.
    ///
    /// `messages` pairs constraint names with the client-facing message.
    pub(crate) fn from_unique(err: sqlx::Error, messages: &[(&str, &str)]) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            let constraint = db_err.constraint().unwrap_or_default();
            let message = messages
                .iter()
                .find(|(name, _)| *name == constraint)
                .map_or("already exists", |(_, message)| *message);
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the history is inconsistent.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Read a non-negative `INTEGER` column into a `u32`.
pub(crate) fn to_u32(column: &str, value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}

/// Bind a `u32` count into an `INTEGER` column.
pub(crate) fn to_i32(column: &str, value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("{column} out of range: {value}")))
}
