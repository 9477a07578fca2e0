//! Command implementations.

pub mod admin;
pub mod category;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use ventas_server::config::{ConfigError, get_database_url};
use ventas_server::db::{self, RepositoryError};
use ventas_server::services::{AuthError, CatalogServiceError};

/// Errors reported by any command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Catalog(#[from] CatalogServiceError),

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid input: {0}")]
    Invalid(String),
}

/// Open a pool using the explicit URL or the environment.
///
/// # Errors
///
/// Returns `CliError::Config` when no URL is configured and
/// `CliError::Database` when the connection fails.
pub async fn connect(database_url: Option<String>) -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let url = match database_url {
        Some(url) => SecretString::from(url),
        None => get_database_url("VENTAS_DATABASE_URL")?,
    };

    let pool = db::create_pool(&url).await?;
    tracing::debug!("connected to database");
    Ok(pool)
}
