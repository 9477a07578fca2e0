//! Category queries.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ventas_core::CategoryId;
use ventas_core::catalog::CategoryFields;

use super::RepositoryError;
use crate::models::category::Category;

const UNIQUE_MESSAGES: &[(&str, &str)] = &[("categories_name_key", "category name already exists")];

const CATEGORY_COLUMNS: &str = "id, name, description, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    description: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is already registered.
    pub async fn create(&self, fields: &CategoryFields) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "INSERT INTO categories (id, name, description)
             VALUES ($1, $2, $3)
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(CategoryId::new())
        .bind(&fields.name)
        .bind(&fields.description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, UNIQUE_MESSAGES))?;

        Ok(row.into())
    }

    /// Find a category by exact name, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List active categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a category by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get an active category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        Ok(self.get(id).await?.filter(|c| c.is_active))
    }

    /// Overwrite name and description of an active category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category is missing or inactive.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update_active(
        &self,
        id: CategoryId,
        fields: &CategoryFields,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "UPDATE categories SET name = $2, description = $3, updated_at = NOW()
             WHERE id = $1 AND is_active
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.description)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, UNIQUE_MESSAGES))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Flip the soft-delete flag, whatever its current value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn set_active(
        &self,
        id: CategoryId,
        active: bool,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "UPDATE categories SET is_active = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Move every product of `from` into `to`. Returns the number moved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn reassign_products(
        &self,
        from: CategoryId,
        to: CategoryId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET category_id = $2, updated_at = NOW() WHERE category_id = $1",
        )
        .bind(from)
        .bind(to)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
