//! Invoice response view.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use ventas_core::invoice::Invoice;
use ventas_core::{InvoiceId, InvoiceStatus, Money, ProductId, UserId};

use super::UserSummary;

/// An invoice with buyer and product names expanded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    pub id: InvoiceId,
    pub user_id: UserId,
    /// Present when the buyer was loaded alongside the invoice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    pub lines: Vec<InvoiceLineView>,
    pub total: Money,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLineView {
    pub product_id: ProductId,
    pub product_name: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl InvoiceView {
    #[must_use]
    pub fn new(
        invoice: &Invoice,
        user: Option<UserSummary>,
        product_names: &HashMap<ProductId, String>,
    ) -> Self {
        Self {
            id: invoice.id(),
            user_id: invoice.user_id(),
            user,
            lines: invoice
                .lines()
                .iter()
                .map(|line| InvoiceLineView {
                    product_id: line.product_id,
                    product_name: product_names.get(&line.product_id).cloned(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total: line.line_total(),
                })
                .collect(),
            total: invoice.total(),
            status: invoice.status(),
            created_at: invoice.created_at(),
            updated_at: invoice.updated_at(),
        }
    }
}
