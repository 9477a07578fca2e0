//! Category and product management.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use ventas_core::catalog::{CatalogError, CategoryFields, ProductFields, ProductPatch};
use ventas_core::{CategoryId, ProductId};

use crate::db::{CategoryRepository, ProductRepository, RepositoryError};
use crate::models::category::Category;
use crate::models::product::Product;

#[derive(Debug, Error)]
pub enum CatalogServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Invalid(#[from] CatalogError),

    #[error("the fallback category cannot be deactivated")]
    FallbackCategory,

    /// The category was deactivated but its products could not be moved.
    #[error("category deactivated, but products were not reassigned: {0}")]
    FallbackUnavailable(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CatalogServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            other => Self::Repository(other),
        }
    }
}

pub struct CatalogService<'a> {
    categories: CategoryRepository<'a>,
    products: ProductRepository<'a>,
    fallback_category: Option<CategoryId>,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, fallback_category: Option<CategoryId>) -> Self {
        Self {
            categories: CategoryRepository::new(pool),
            products: ProductRepository::new(pool),
            fallback_category,
        }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Conflict` if the name is taken.
    #[instrument(skip(self, fields), fields(name = %fields.name))]
    pub async fn add_category(
        &self,
        fields: &CategoryFields,
    ) -> Result<Category, CatalogServiceError> {
        let category = self.categories.create(fields).await?;
        tracing::info!(category_id = %category.id, "category created");
        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` if the category is missing or
    /// inactive.
    pub async fn get_category(&self, id: CategoryId) -> Result<Category, CatalogServiceError> {
        self.categories
            .get_active(id)
            .await?
            .ok_or(CatalogServiceError::NotFound("category"))
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` if the category is missing or
    /// inactive.
    #[instrument(skip(self, fields))]
    pub async fn update_category(
        &self,
        id: CategoryId,
        fields: &CategoryFields,
    ) -> Result<Category, CatalogServiceError> {
        self.categories
            .update_active(id, fields)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CatalogServiceError::NotFound("category"),
                other => other.into(),
            })
    }

    /// Deactivate a category and move its products to the fallback category.
    ///
    /// The deactivation is committed before the products are moved. If the
    /// fallback cannot be resolved the category stays deactivated and
    /// `CatalogServiceError::FallbackUnavailable` is returned.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::FallbackCategory` when asked to
    /// deactivate the fallback itself, with nothing changed.
    #[instrument(skip(self))]
    pub async fn deactivate_category(
        &self,
        id: CategoryId,
    ) -> Result<Category, CatalogServiceError> {
        if self.fallback_category == Some(id) {
            return Err(CatalogServiceError::FallbackCategory);
        }

        let category = self
            .categories
            .set_active(id, false)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CatalogServiceError::NotFound("category"),
                other => other.into(),
            })?;

        let fallback = self.resolve_fallback().await?;
        let moved = self.categories.reassign_products(id, fallback).await?;
        tracing::info!(category_id = %id, fallback = %fallback, moved, "category deactivated");
        Ok(category)
    }

    /// Reactivate a category, whatever its current state.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` if the category does not exist.
    #[instrument(skip(self))]
    pub async fn activate_category(
        &self,
        id: CategoryId,
    ) -> Result<Category, CatalogServiceError> {
        self.categories
            .set_active(id, true)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CatalogServiceError::NotFound("category"),
                other => other.into(),
            })
    }

    async fn resolve_fallback(&self) -> Result<CategoryId, CatalogServiceError> {
        let Some(fallback) = self.fallback_category else {
            tracing::error!("VENTAS_DEFAULT_CATEGORY_ID is not set; products left in place");
            return Err(CatalogServiceError::FallbackUnavailable(
                "no fallback category is configured".to_owned(),
            ));
        };

        let resolved = match self.categories.get(fallback).await? {
            Some(category) if category.is_active => Ok(fallback),
            Some(_) => Err(CatalogServiceError::FallbackUnavailable(format!(
                "fallback category {fallback} is inactive"
            ))),
            None => Err(CatalogServiceError::FallbackUnavailable(format!(
                "fallback category {fallback} does not exist"
            ))),
        };
        resolved.inspect_err(|e| tracing::error!(error = %e, "fallback category unavailable"))
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Invalid` for bad fields and
    /// `CatalogServiceError::NotFound` if the category is missing or inactive.
    #[instrument(skip(self, fields), fields(name = %fields.name))]
    pub async fn add_product(
        &self,
        mut fields: ProductFields,
    ) -> Result<Product, CatalogServiceError> {
        fields.validate()?;
        self.get_category(fields.category_id).await?;

        let product = self.products.create(&fields).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Apply a partial update.
    ///
    /// Returns the updated product and the image the update replaced, if any.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` for an unknown product or a
    /// missing or inactive target category.
    #[instrument(skip(self, patch))]
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<(Product, Option<String>), CatalogServiceError> {
        let current = self
            .products
            .get(id)
            .await?
            .ok_or(CatalogServiceError::NotFound("product"))?;

        if let Some(category_id) = patch.category_id
            && category_id != current.category_id
        {
            self.get_category(category_id).await?;
        }

        let mut fields = current.fields();
        let replaced = patch.apply(&mut fields)?;
        let product = self.products.update(id, &fields).await?;
        Ok((product, replaced))
    }

    /// Set the active flag. Stock is not considered.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn set_product_active(
        &self,
        id: ProductId,
        active: bool,
    ) -> Result<Product, CatalogServiceError> {
        self.products
            .set_active(id, active)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CatalogServiceError::NotFound("product"),
                other => other.into(),
            })
    }
}
