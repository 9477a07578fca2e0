//! Product queries and the stock mutations used by checkout.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use ventas_core::catalog::ProductFields;
use ventas_core::checkout::ProductSnapshot;
use ventas_core::invoice::StockMovement;
use ventas_core::{CategoryId, Money, ProductId};

use super::{RepositoryError, to_i32, to_u32};
use crate::models::category::CategorySummary;
use crate::models::product::{Product, ProductSummary, ProductWithCategory};

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.price, p.stock, p.sold, \
                               p.category_id, p.image, p.is_active, p.created_at, p.updated_at";

const EXPANDED_COLUMNS: &str = "p.id, p.name, p.description, p.price, p.stock, p.sold, \
                                p.category_id, p.image, p.is_active, p.created_at, p.updated_at, \
                                c.name AS category_name, c.is_active AS category_is_active";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: String,
    price: Decimal,
    stock: i32,
    sold: i32,
    category_id: CategoryId,
    image: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: Money::from_decimal(row.price),
            stock: to_u32("stock", row.stock)?,
            sold: to_u32("sold", row.sold)?,
            category_id: row.category_id,
            image: row.image,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ExpandedProductRow {
    #[sqlx(flatten)]
    product: ProductRow,
    category_name: String,
    category_is_active: bool,
}

impl TryFrom<ExpandedProductRow> for ProductWithCategory {
    type Error = RepositoryError;

    fn try_from(row: ExpandedProductRow) -> Result<Self, Self::Error> {
        let product: Product = row.product.try_into()?;
        let category = CategorySummary {
            id: product.category_id,
            name: row.category_name,
            is_active: row.category_is_active,
        };
        Ok(Self { product, category })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, fields: &ProductFields) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO products AS p (id, name, description, price, stock, category_id, image)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(ProductId::new())
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price)
        .bind(to_i32("stock", fields.stock)?)
        .bind(fields.category_id)
        .bind(&fields.image)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a product with its category expanded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_expanded(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductWithCategory>, RepositoryError> {
        let row = sqlx::query_as::<_, ExpandedProductRow>(&format!(
            "SELECT {EXPANDED_COLUMNS}
             FROM products p JOIN categories c ON c.id = p.category_id
             WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List every product with its category, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_expanded(&self) -> Result<Vec<ProductWithCategory>, RepositoryError> {
        let rows = sqlx::query_as::<_, ExpandedProductRow>(&format!(
            "SELECT {EXPANDED_COLUMNS}
             FROM products p JOIN categories c ON c.id = p.category_id
             ORDER BY p.created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Case-insensitive name search. `pattern` is an escaped `ILIKE` pattern.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search_by_name(
        &self,
        pattern: &str,
    ) -> Result<Vec<ProductWithCategory>, RepositoryError> {
        let rows = sqlx::query_as::<_, ExpandedProductRow>(&format!(
            "SELECT {EXPANDED_COLUMNS}
             FROM products p JOIN categories c ON c.id = p.category_id
             WHERE p.name ILIKE $1 ESCAPE '\\'
             ORDER BY p.name"
        ))
        .bind(pattern)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Best sellers by units sold. Ties keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_sellers(
        &self,
        limit: i64,
    ) -> Result<Vec<ProductWithCategory>, RepositoryError> {
        let rows = sqlx::query_as::<_, ExpandedProductRow>(&format!(
            "SELECT {EXPANDED_COLUMNS}
             FROM products p JOIN categories c ON c.id = p.category_id
             ORDER BY p.sold DESC, p.created_at ASC, p.id ASC
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Summaries for the given products, keyed by ID. Missing IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summaries(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductSummary>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let product = Product::try_from(row)?;
                Ok((product.id, product.summary()))
            })
            .collect()
    }

    /// Overwrite every editable field.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products AS p SET
                 name = $2, description = $3, price = $4, stock = $5,
                 category_id = $6, image = $7, updated_at = NOW()
             WHERE p.id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price)
        .bind(to_i32("stock", fields.stock)?)
        .bind(fields.category_id)
        .bind(&fields.image)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Set the active flag. Stock is untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_active(&self, id: ProductId, active: bool) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products AS p SET is_active = $2, updated_at = NOW()
             WHERE p.id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }
}

// =============================================================================
// Transactional stock operations
// =============================================================================

/// Lock the given product rows and return checkout snapshots keyed by ID.
///
/// Rows are locked in ID order so concurrent checkouts over overlapping
/// products cannot deadlock. Unknown IDs are simply absent from the map.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_for_checkout(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<HashMap<ProductId, ProductSnapshot>, RepositoryError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p
         WHERE p.id = ANY($1)
         ORDER BY p.id
         FOR UPDATE"
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| {
            let product = Product::try_from(row)?;
            Ok((product.id, product.snapshot()))
        })
        .collect()
}

/// Take sold units out of stock and add them to the sold counter.
///
/// Each update is guarded by `stock >= quantity`; a miss means the stock
/// changed under us and the caller must roll back. The sold counter
/// saturates at the `INTEGER` ceiling.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if any guard misses.
pub async fn take_stock(
    conn: &mut PgConnection,
    movements: &[StockMovement],
) -> Result<(), RepositoryError> {
    for movement in movements {
        let quantity = to_i32("quantity", movement.quantity)?;
        let result = sqlx::query(
            "UPDATE products
             SET stock = stock - $2,
                 sold = LEAST(sold::BIGINT + $2, 2147483647)::INTEGER,
                 updated_at = NOW()
             WHERE id = $1 AND stock >= $2",
        )
        .bind(movement.product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() != 1 {
            return Err(RepositoryError::Conflict(format!(
                "stock changed for product {}",
                movement.product_id
            )));
        }
    }
    Ok(())
}

/// Put cancelled units back into stock and take them off the sold counter.
///
/// Restored stock saturates at the `INTEGER` ceiling.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if a product row is missing.
pub async fn return_stock(
    conn: &mut PgConnection,
    movements: &[StockMovement],
) -> Result<(), RepositoryError> {
    for movement in movements {
        let quantity = to_i32("quantity", movement.quantity)?;
        let result = sqlx::query(
            "UPDATE products
             SET stock = LEAST(stock::BIGINT + $2, 2147483647)::INTEGER,
                 sold = GREATEST(sold - $2, 0),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(movement.product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() != 1 {
            return Err(RepositoryError::NotFound);
        }
    }
    Ok(())
}
