//! Cart persistence.
//!
//! A cart is stored as one `carts` row plus ordered `cart_lines`. Saving
//! replaces every line, so whatever the [`Cart`] aggregate holds is exactly
//! what ends up in the database.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use ventas_core::cart::{Cart, CartLine};
use ventas_core::{CartId, Money, ProductId, UserId};

use super::{RepositoryError, to_i32, to_u32};

const UNIQUE_MESSAGES: &[(&str, &str)] = &[("carts_user_id_key", "cart already exists")];

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    quantity: i32,
    unit_price: Decimal,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: row.product_id,
            quantity: to_u32("quantity", row.quantity)?,
            unit_price: Money::from_decimal(row.unit_price),
        })
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load the cart belonging to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, user_id, false).await
    }

    /// Insert a new, empty cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has a cart.
    pub async fn create(&self, cart: &Cart) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO carts (id, user_id, total, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(cart.id())
        .bind(cart.user_id())
        .bind(cart.total())
        .bind(cart.created_at())
        .bind(cart.updated_at())
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, UNIQUE_MESSAGES))?;

        Ok(())
    }

    /// Persist the cart's lines and total in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart row no longer exists.
    pub async fn save(&self, cart: &Cart) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        save(&mut tx, cart).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Load a user's cart, optionally locking its row for the rest of the
/// transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn load(
    conn: &mut PgConnection,
    user_id: UserId,
    for_update: bool,
) -> Result<Option<Cart>, RepositoryError> {
    let sql = if for_update {
        "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = $1 FOR UPDATE"
    } else {
        "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = $1"
    };
    let Some(row) = sqlx::query_as::<_, CartRow>(sql)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let lines = sqlx::query_as::<_, CartLineRow>(
        "SELECT product_id, quantity, unit_price
         FROM cart_lines
         WHERE cart_id = $1
         ORDER BY position",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(TryInto::try_into)
    .collect::<Result<Vec<CartLine>, _>>()?;

    Ok(Some(Cart::restore(
        row.id,
        row.user_id,
        lines,
        row.created_at,
        row.updated_at,
    )))
}

/// Replace the stored lines and total with the aggregate's.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the cart row does not exist.
pub async fn save(conn: &mut PgConnection, cart: &Cart) -> Result<(), RepositoryError> {
    let updated = sqlx::query("UPDATE carts SET total = $2, updated_at = NOW() WHERE id = $1")
        .bind(cart.id())
        .bind(cart.total())
        .execute(&mut *conn)
        .await?;
    if updated.rows_affected() != 1 {
        return Err(RepositoryError::NotFound);
    }

    sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
        .bind(cart.id())
        .execute(&mut *conn)
        .await?;

    for (position, line) in cart.lines().iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| RepositoryError::DataCorruption("too many cart lines".to_owned()))?;
        sqlx::query(
            "INSERT INTO cart_lines (cart_id, position, product_id, quantity, unit_price)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(cart.id())
        .bind(position)
        .bind(line.product_id)
        .bind(to_i32("quantity", line.quantity)?)
        .bind(line.unit_price)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
