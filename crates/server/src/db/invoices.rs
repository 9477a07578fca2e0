//! Invoice persistence.
//!
//! Reads return [`InvoiceView`]s with the buyer and product names joined in.
//! Writes go through the free functions so they can share a transaction with
//! the stock updates that accompany them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use ventas_core::invoice::{Invoice, InvoiceLine};
use ventas_core::{Email, InvoiceId, InvoiceStatus, Money, ProductId, UserId};

use super::{RepositoryError, to_i32, to_u32};
use crate::models::invoice::InvoiceView;
use crate::models::user::UserSummary;

const INVOICE_COLUMNS: &str = "i.id, i.user_id, i.total, i.status, i.created_at, i.updated_at";

const VIEW_COLUMNS: &str = "i.id, i.user_id, i.total, i.status, i.created_at, i.updated_at, \
                            u.name AS user_name, u.username AS user_username, \
                            u.email AS user_email";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: InvoiceId,
    user_id: UserId,
    total: Decimal,
    status: InvoiceStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceViewRow {
    #[sqlx(flatten)]
    invoice: InvoiceRow,
    user_name: String,
    user_username: String,
    user_email: String,
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceLineRow {
    invoice_id: InvoiceId,
    product_id: ProductId,
    product_name: Option<String>,
    quantity: i32,
    unit_price: Decimal,
}

/// Lines and product names for a set of invoices.
#[derive(Default)]
struct LoadedLines {
    lines: HashMap<InvoiceId, Vec<InvoiceLine>>,
    product_names: HashMap<ProductId, String>,
}

impl LoadedLines {
    fn restore(&mut self, row: InvoiceRow) -> Invoice {
        Invoice::restore(
            row.id,
            row.user_id,
            self.lines.remove(&row.id).unwrap_or_default(),
            Money::from_decimal(row.total),
            row.status,
            row.created_at,
            row.updated_at,
        )
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for invoice database operations.
pub struct InvoiceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> InvoiceRepository<'a> {
    /// Create a new invoice repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every invoice, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_all(&self) -> Result<Vec<InvoiceView>, RepositoryError> {
        let rows = sqlx::query_as::<_, InvoiceViewRow>(&format!(
            "SELECT {VIEW_COLUMNS}
             FROM invoices i JOIN users u ON u.id = i.user_id
             ORDER BY i.created_at DESC, i.id"
        ))
        .fetch_all(self.pool)
        .await?;

        self.expand(rows).await
    }

    /// A single buyer's invoices, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<InvoiceView>, RepositoryError> {
        let rows = sqlx::query_as::<_, InvoiceViewRow>(&format!(
            "SELECT {VIEW_COLUMNS}
             FROM invoices i JOIN users u ON u.id = i.user_id
             WHERE i.user_id = $1
             ORDER BY i.created_at DESC, i.id"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        self.expand(rows).await
    }

    /// One invoice with buyer and product names.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: InvoiceId) -> Result<Option<InvoiceView>, RepositoryError> {
        let row = sqlx::query_as::<_, InvoiceViewRow>(&format!(
            "SELECT {VIEW_COLUMNS}
             FROM invoices i JOIN users u ON u.id = i.user_id
             WHERE i.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(self.expand(row.into_iter().collect()).await?.pop())
    }

    async fn expand(&self, rows: Vec<InvoiceViewRow>) -> Result<Vec<InvoiceView>, RepositoryError> {
        let ids: Vec<InvoiceId> = rows.iter().map(|row| row.invoice.id).collect();
        let mut conn = self.pool.acquire().await?;
        let mut loaded = load_lines(&mut conn, &ids).await?;

        rows.into_iter()
            .map(|row| {
                let email = Email::parse(&row.user_email).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
                })?;
                let user = UserSummary {
                    id: row.invoice.user_id,
                    name: row.user_name,
                    username: row.user_username,
                    email,
                };
                let invoice = loaded.restore(row.invoice);
                Ok(InvoiceView::new(&invoice, Some(user), &loaded.product_names))
            })
            .collect()
    }
}

async fn load_lines(
    conn: &mut PgConnection,
    ids: &[InvoiceId],
) -> Result<LoadedLines, RepositoryError> {
    let mut loaded = LoadedLines::default();
    if ids.is_empty() {
        return Ok(loaded);
    }

    let rows = sqlx::query_as::<_, InvoiceLineRow>(
        "SELECT l.invoice_id, l.product_id, p.name AS product_name, l.quantity, l.unit_price
         FROM invoice_lines l LEFT JOIN products p ON p.id = l.product_id
         WHERE l.invoice_id = ANY($1)
         ORDER BY l.invoice_id, l.position",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    for row in rows {
        if let Some(name) = row.product_name {
            loaded.product_names.insert(row.product_id, name);
        }
        loaded.lines.entry(row.invoice_id).or_default().push(InvoiceLine {
            product_id: row.product_id,
            quantity: to_u32("quantity", row.quantity)?,
            unit_price: Money::from_decimal(row.unit_price),
        });
    }
    Ok(loaded)
}

// =============================================================================
// Transactional writes
// =============================================================================

/// Insert an invoice and its lines.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if an insert fails.
pub async fn insert(conn: &mut PgConnection, invoice: &Invoice) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO invoices (id, user_id, total, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(invoice.id())
    .bind(invoice.user_id())
    .bind(invoice.total())
    .bind(invoice.status())
    .bind(invoice.created_at())
    .bind(invoice.updated_at())
    .execute(&mut *conn)
    .await?;

    for (position, line) in invoice.lines().iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| RepositoryError::DataCorruption("too many invoice lines".to_owned()))?;
        sqlx::query(
            "INSERT INTO invoice_lines (invoice_id, position, product_id, quantity, unit_price)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(invoice.id())
        .bind(position)
        .bind(line.product_id)
        .bind(to_i32("quantity", line.quantity)?)
        .bind(line.unit_price)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Load an invoice and lock its row until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn get_for_update(
    conn: &mut PgConnection,
    id: InvoiceId,
) -> Result<Option<Invoice>, RepositoryError> {
    let Some(row) = sqlx::query_as::<_, InvoiceRow>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices i WHERE i.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let mut loaded = load_lines(conn, &[id]).await?;
    Ok(Some(loaded.restore(row)))
}

/// Persist the invoice's status and `updated_at`.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the invoice row does not exist.
pub async fn update_status(conn: &mut PgConnection, invoice: &Invoice) -> Result<(), RepositoryError> {
    let result = sqlx::query("UPDATE invoices SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(invoice.id())
        .bind(invoice.status())
        .bind(invoice.updated_at())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() != 1 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
