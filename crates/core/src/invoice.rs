//! Invoices and their status state machine.
//!
//! ```text
//! PENDING ──► PAID
//!    │
//!    └──────► CANCELLED
//! ```
//!
//! Lines and total are fixed when the invoice is issued. Only the status
//! (and `updated_at`) ever changes afterwards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::types::{InvoiceId, InvoiceStatus, Money, ProductId, UserId};

/// Errors raised by invoice status changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceError {
    #[error("invoice is already cancelled")]
    AlreadyCancelled,

    #[error("a paid invoice cannot be cancelled")]
    AlreadyPaid,

    #[error("invoice status {from} is final and cannot change to {to}")]
    Frozen {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },
}

/// A billed product, priced when the invoice was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl InvoiceLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// A quantity of one product moving into or out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Collapse lines into one movement per product, ordered by product id.
///
/// Ordering by id gives every writer the same row-lock order.
#[must_use]
pub fn stock_movements<I>(lines: I) -> Vec<StockMovement>
where
    I: IntoIterator<Item = (ProductId, u32)>,
{
    let mut by_product: BTreeMap<ProductId, u32> = BTreeMap::new();
    for (product_id, quantity) in lines {
        let entry = by_product.entry(product_id).or_default();
        *entry = entry.saturating_add(quantity);
    }
    by_product
        .into_iter()
        .map(|(product_id, quantity)| StockMovement {
            product_id,
            quantity,
        })
        .collect()
}

/// Outcome of [`Invoice::transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// Requested status equals the current one; nothing to persist.
    Unchanged,
    /// Moved to `PAID`.
    Paid,
    /// Moved to `CANCELLED`; the listed quantities go back into stock.
    Cancelled { restock: Vec<StockMovement> },
}

/// A billing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    id: InvoiceId,
    user_id: UserId,
    lines: Vec<InvoiceLine>,
    total: Money,
    status: InvoiceStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Issue a new invoice. The total is the sum of the line totals.
    #[must_use]
    pub fn issue(
        user_id: UserId,
        lines: Vec<InvoiceLine>,
        status: InvoiceStatus,
        now: DateTime<Utc>,
    ) -> Self {
        let total = lines.iter().map(InvoiceLine::line_total).sum();
        Self {
            id: InvoiceId::new(),
            user_id,
            lines,
            total,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild an invoice read back from storage.
    #[must_use]
    pub const fn restore(
        id: InvoiceId,
        user_id: UserId,
        lines: Vec<InvoiceLine>,
        total: Money,
        status: InvoiceStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            lines,
            total,
            status,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub const fn id(&self) -> InvoiceId {
        self.id
    }

    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    #[must_use]
    pub const fn total(&self) -> Money {
        self.total
    }

    #[must_use]
    pub const fn status(&self) -> InvoiceStatus {
        self.status
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Cancel a pending invoice.
    ///
    /// Returns the quantities to put back into stock, which are exactly the
    /// quantities taken out when the invoice was issued.
    ///
    /// # Errors
    ///
    /// Fails without changing anything if the invoice is already paid or
    /// already cancelled.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<Vec<StockMovement>, InvoiceError> {
        match self.status {
            InvoiceStatus::Paid => Err(InvoiceError::AlreadyPaid),
            InvoiceStatus::Cancelled => Err(InvoiceError::AlreadyCancelled),
            InvoiceStatus::Pending => {
                self.status = InvoiceStatus::Cancelled;
                self.updated_at = now;
                Ok(stock_movements(
                    self.lines.iter().map(|l| (l.product_id, l.quantity)),
                ))
            }
        }
    }

    /// Move to `to`, following the state machine.
    ///
    /// `PENDING → CANCELLED` goes through [`Invoice::cancel`] so stock is
    /// restored the same way on every path.
    ///
    /// # Errors
    ///
    /// Returns [`InvoiceError::Frozen`] when the invoice is already in a
    /// terminal state.
    pub fn transition(
        &mut self,
        to: InvoiceStatus,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, InvoiceError> {
        if self.status.is_terminal() {
            return Err(InvoiceError::Frozen {
                from: self.status,
                to,
            });
        }

        match to {
            InvoiceStatus::Pending => Ok(StatusChange::Unchanged),
            InvoiceStatus::Paid => {
                self.status = InvoiceStatus::Paid;
                self.updated_at = now;
                Ok(StatusChange::Paid)
            }
            InvoiceStatus::Cancelled => {
                let restock = self.cancel(now)?;
                Ok(StatusChange::Cancelled { restock })
            }
        }
    }
}
