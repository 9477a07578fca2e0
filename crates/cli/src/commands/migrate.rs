//! `ventas migrate`: apply the migrations embedded in the server crate.

use sqlx::PgPool;
use ventas_server::db;

use super::CliError;

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `CliError::Migration` if a migration fails or the recorded
/// history no longer matches the embedded files.
pub async fn run(pool: &PgPool) -> Result<(), CliError> {
    tracing::info!(
        available = db::MIGRATOR.iter().count(),
        "running migrations"
    );
    db::run_migrations(pool).await?;
    tracing::info!("migrations complete");
    Ok(())
}
