//! `ventas category ensure-default`.

use sqlx::PgPool;

use ventas_core::catalog::CategoryFields;
use ventas_server::db::CategoryRepository;

use super::CliError;

/// Find or create the category products fall back to when theirs is
/// deactivated, and print its id for `VENTAS_DEFAULT_CATEGORY_ID`.
///
/// An existing but inactive category of that name is reactivated.
///
/// # Errors
///
/// Returns `CliError::Repository` on database failures.
pub async fn ensure_default(pool: &PgPool, name: &str) -> Result<(), CliError> {
    let categories = CategoryRepository::new(pool);

    let category = match categories.get_by_name(name.trim()).await? {
        Some(existing) if existing.is_active => existing,
        Some(inactive) => {
            tracing::info!(category_id = %inactive.id, "reactivating fallback category");
            categories.set_active(inactive.id, true).await?
        }
        None => {
            let fields = CategoryFields::validated(name, "Products whose category was removed")
                .map_err(|e| CliError::Invalid(e.to_string()))?;
            let created = categories.create(&fields).await?;
            tracing::info!(category_id = %created.id, "fallback category created");
            created
        }
    };

    #[allow(clippy::print_stdout)]
    {
        println!("VENTAS_DEFAULT_CATEGORY_ID={}", category.id);
    }
    Ok(())
}
