//! Checkout, payment and invoice status changes.
//!
//! Every workflow here runs in a single transaction:
//!
//! 1. Lock the invoice, cart or product rows involved (products in id order)
//! 2. Decide with the pure `ventas_core` rules, with no writes on rejection
//! 3. Write invoice, stock and cart changes
//! 4. Commit
//!
//! Dropping the transaction on any error rolls everything back, so stock,
//! carts and invoices never disagree.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::instrument;

use ventas_core::checkout::{self, CheckoutError, CheckoutItem};
use ventas_core::invoice::{Invoice, InvoiceError, StatusChange};
use ventas_core::{InvoiceId, InvoiceStatus, ProductId, UserId};

use crate::db::invoices::{self, InvoiceRepository};
use crate::db::{RepositoryError, UserRepository, carts, products};
use crate::models::invoice::InvoiceView;

/// Why a checkout workflow did not complete.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Invoice(#[from] InvoiceError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

impl OrderError {
    /// Log a failed workflow. Storage failures are errors; rejected requests
    /// are routine.
    fn log(&self, workflow: &'static str) {
        match self {
            Self::Repository(err) => {
                tracing::error!(workflow, error = %err, "checkout rolled back");
            }
            other => tracing::info!(workflow, reason = %other, "checkout rejected"),
        }
    }
}

/// Checkout and invoice workflows.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Bill `user_id` for an explicit list of products. The invoice starts
    /// `PENDING`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for a missing or inactive user, and
    /// `OrderError::Checkout` if planning rejects the items.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn create_invoice(
        &self,
        user_id: UserId,
        items: &[CheckoutItem],
    ) -> Result<InvoiceView, OrderError> {
        let buyer = UserRepository::new(self.pool).get_by_id(user_id).await?;
        if !buyer.is_some_and(|user| user.is_active) {
            return Err(OrderError::NotFound("user"));
        }

        let result = async {
            let mut tx = self.pool.begin().await?;
            let invoice = issue(&mut tx, user_id, items, InvoiceStatus::Pending).await?;
            tx.commit().await?;
            Ok::<_, OrderError>(invoice)
        }
        .await;

        let invoice = result.inspect_err(|e| e.log("manual invoice"))?;
        tracing::info!(invoice_id = %invoice.id(), total = %invoice.total(), "invoice created");
        self.view(invoice.id()).await
    }

    /// Pay for everything in the caller's cart. The invoice is created
    /// `PAID` and the cart is emptied.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the user has no cart and
    /// `CheckoutError::EmptyOrder` if it has no lines.
    #[instrument(skip(self))]
    pub async fn pay_cart(&self, user_id: UserId) -> Result<InvoiceView, OrderError> {
        let result = async {
            let mut tx = self.pool.begin().await?;
            let mut cart = carts::load(&mut tx, user_id, true)
                .await?
                .ok_or(OrderError::NotFound("cart"))?;

            let items = checkout::items_from_cart(&cart);
            let invoice = issue(&mut tx, user_id, &items, InvoiceStatus::Paid).await?;

            cart.clear();
            carts::save(&mut tx, &cart).await?;
            tx.commit().await?;
            Ok::<_, OrderError>(invoice)
        }
        .await;

        let invoice = result.inspect_err(|e| e.log("payment"))?;
        tracing::info!(invoice_id = %invoice.id(), total = %invoice.total(), "cart paid");
        self.view(invoice.id()).await
    }

    /// Cancel a pending invoice and put its quantities back into stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown invoice and
    /// `OrderError::Invoice` if it is already paid or cancelled.
    #[instrument(skip(self))]
    pub async fn cancel_invoice(&self, id: InvoiceId) -> Result<InvoiceView, OrderError> {
        let result = async {
            let mut tx = self.pool.begin().await?;
            let mut invoice = invoices::get_for_update(&mut tx, id)
                .await?
                .ok_or(OrderError::NotFound("invoice"))?;

            let restock = invoice.cancel(Utc::now())?;
            products::return_stock(&mut tx, &restock).await?;
            invoices::update_status(&mut tx, &invoice).await?;
            tx.commit().await?;
            Ok::<_, OrderError>(())
        }
        .await;

        result.inspect_err(|e| e.log("cancellation"))?;
        tracing::info!(invoice_id = %id, "invoice cancelled");
        self.view(id).await
    }

    /// Move an invoice to `status`. Cancelling goes through the same stock
    /// restoration as [`CheckoutService::cancel_invoice`].
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown invoice and
    /// `InvoiceError::Frozen` when it is already paid or cancelled.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<InvoiceView, OrderError> {
        let result = async {
            let mut tx = self.pool.begin().await?;
            let mut invoice = invoices::get_for_update(&mut tx, id)
                .await?
                .ok_or(OrderError::NotFound("invoice"))?;

            match invoice.transition(status, Utc::now())? {
                StatusChange::Unchanged => {}
                StatusChange::Paid => invoices::update_status(&mut tx, &invoice).await?,
                StatusChange::Cancelled { restock } => {
                    products::return_stock(&mut tx, &restock).await?;
                    invoices::update_status(&mut tx, &invoice).await?;
                }
            }
            tx.commit().await?;
            Ok::<_, OrderError>(invoice.status())
        }
        .await;

        let status = result.inspect_err(|e| e.log("status update"))?;
        tracing::info!(invoice_id = %id, status = %status, "invoice status updated");
        self.view(id).await
    }

    async fn view(&self, id: InvoiceId) -> Result<InvoiceView, OrderError> {
        InvoiceRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or(OrderError::NotFound("invoice"))
    }
}

/// Lock, plan, insert and take stock inside the caller's transaction.
async fn issue(
    conn: &mut PgConnection,
    user_id: UserId,
    items: &[CheckoutItem],
    status: InvoiceStatus,
) -> Result<Invoice, OrderError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyOrder.into());
    }

    let mut ids: Vec<ProductId> = items.iter().map(|item| item.product_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let catalog: HashMap<_, _> = products::lock_for_checkout(conn, &ids).await?;
    let plan = checkout::plan(items, &catalog)?;

    let invoice = Invoice::issue(user_id, plan.lines, status, Utc::now());
    invoices::insert(conn, &invoice).await?;
    products::take_stock(conn, &plan.stock).await?;

    Ok(invoice)
}
