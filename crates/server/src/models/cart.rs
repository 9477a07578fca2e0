//! Cart response view.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use ventas_core::cart::Cart;
use ventas_core::{CartId, Money, ProductId, UserId};

use super::ProductSummary;

/// A cart with each line's product expanded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub id: CartId,
    pub user_id: UserId,
    pub lines: Vec<CartLineView>,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub product_id: ProductId,
    /// `None` only if the product row vanished, which foreign keys prevent.
    pub product: Option<ProductSummary>,
    pub quantity: u32,
    /// Price captured when the line was added.
    pub unit_price: Money,
    pub line_total: Money,
}

impl CartView {
    #[must_use]
    pub fn new(cart: &Cart, products: &HashMap<ProductId, ProductSummary>) -> Self {
        Self {
            id: cart.id(),
            user_id: cart.user_id(),
            lines: cart
                .lines()
                .iter()
                .map(|line| CartLineView {
                    product_id: line.product_id,
                    product: products.get(&line.product_id).cloned(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total: line.line_total(),
                })
                .collect(),
            total: cart.total(),
            created_at: cart.created_at(),
            updated_at: cart.updated_at(),
        }
    }
}
