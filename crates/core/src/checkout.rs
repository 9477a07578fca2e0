//! Checkout planning.
//!
//! Turns a list of requested items plus a snapshot of the referenced products
//! into invoice lines, a total, and the stock to take out. Planning is pure:
//! if it fails, nothing has been written anywhere, which is what makes a
//! rejected checkout leave stock and invoices untouched.

use std::collections::HashMap;

use thiserror::Error;

use crate::cart::{Cart, MAX_LINE_QUANTITY};
use crate::invoice::{InvoiceLine, StockMovement, stock_movements};
use crate::types::{Money, ProductId};

/// Why a checkout was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("nothing to check out")]
    EmptyOrder,

    #[error("quantity for product {product_id} must be between 1 and {MAX_LINE_QUANTITY} (got {quantity})")]
    InvalidQuantity { product_id: ProductId, quantity: u64 },

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("product {0} is not available for sale")]
    ProductUnavailable(ProductId),

    #[error("insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: u32,
        available: u32,
    },
}

/// A requested `{product, quantity}` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// The catalog state a checkout is validated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub is_active: bool,
}

/// A validated checkout, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    /// One line per distinct product, in first-requested order.
    pub lines: Vec<InvoiceLine>,
    pub total: Money,
    /// Stock to decrement, one entry per product, ordered by product id.
    pub stock: Vec<StockMovement>,
}

/// The items held in a cart, for self-checkout.
#[must_use]
pub fn items_from_cart(cart: &Cart) -> Vec<CheckoutItem> {
    cart.lines()
        .iter()
        .map(|line| CheckoutItem {
            product_id: line.product_id,
            quantity: line.quantity,
        })
        .collect()
}

/// Merge repeated products by summing their quantities.
///
/// Keeps the position of each product's first appearance.
///
/// # Errors
///
/// Returns [`CheckoutError::InvalidQuantity`] for a zero quantity or a merged
/// quantity above [`MAX_LINE_QUANTITY`].
pub fn merge_items(items: &[CheckoutItem]) -> Result<Vec<CheckoutItem>, CheckoutError> {
    let mut merged: Vec<CheckoutItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            return Err(CheckoutError::InvalidQuantity {
                product_id: item.product_id,
                quantity: 0,
            });
        }
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => {
                let sum = u64::from(existing.quantity) + u64::from(item.quantity);
                existing.quantity = u32::try_from(sum)
                    .ok()
                    .filter(|q| *q <= MAX_LINE_QUANTITY)
                    .ok_or(CheckoutError::InvalidQuantity {
                        product_id: item.product_id,
                        quantity: sum,
                    })?;
            }
            None => merged.push(*item),
        }
    }
    if let Some(item) = merged.iter().find(|m| m.quantity > MAX_LINE_QUANTITY) {
        return Err(CheckoutError::InvalidQuantity {
            product_id: item.product_id,
            quantity: u64::from(item.quantity),
        });
    }
    Ok(merged)
}

/// Validate `items` against `catalog` and price them at current prices.
///
/// Every product is resolved before any stock is compared, so a request that
/// names an unknown product reports that rather than a stock shortfall.
///
/// # Errors
///
/// - [`CheckoutError::EmptyOrder`] if `items` is empty
/// - [`CheckoutError::InvalidQuantity`] for a zero or oversized quantity
/// - [`CheckoutError::ProductNotFound`] if a product is missing from `catalog`
/// - [`CheckoutError::ProductUnavailable`] if a product is deactivated
/// - [`CheckoutError::InsufficientStock`] if `stock < quantity` for any line
pub fn plan(
    items: &[CheckoutItem],
    catalog: &HashMap<ProductId, ProductSnapshot>,
) -> Result<CheckoutPlan, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyOrder);
    }
    let items = merge_items(items)?;

    let mut resolved = Vec::with_capacity(items.len());
    for item in &items {
        let product = catalog
            .get(&item.product_id)
            .ok_or(CheckoutError::ProductNotFound(item.product_id))?;
        if !product.is_active {
            return Err(CheckoutError::ProductUnavailable(item.product_id));
        }
        resolved.push((item, product));
    }

    for (item, product) in &resolved {
        if product.stock < item.quantity {
            return Err(CheckoutError::InsufficientStock {
                product_id: product.id,
                name: product.name.clone(),
                requested: item.quantity,
                available: product.stock,
            });
        }
    }

    let lines: Vec<InvoiceLine> = resolved
        .iter()
        .map(|(item, product)| InvoiceLine {
            product_id: product.id,
            quantity: item.quantity,
            unit_price: product.price,
        })
        .collect();
    let total = lines.iter().map(InvoiceLine::line_total).sum();
    let stock = stock_movements(lines.iter().map(|l| (l.product_id, l.quantity)));

    Ok(CheckoutPlan {
        lines,
        total,
        stock,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot(stock: u32, cents: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(),
            name: "Widget".to_string(),
            price: Money::from_cents(cents),
            stock,
            is_active: true,
        }
    }

    fn catalog(products: &[&ProductSnapshot]) -> HashMap<ProductId, ProductSnapshot> {
        products.iter().map(|p| (p.id, (*p).clone())).collect()
    }

    fn item(product: &ProductSnapshot, quantity: u32) -> CheckoutItem {
        CheckoutItem {
            product_id: product.id,
            quantity,
        }
    }

    #[test]
    fn test_plan_prices_at_current_price() {
        let a = snapshot(10, 1000);
        let b = snapshot(10, 500);
        let plan = plan(&[item(&a, 2), item(&b, 1)], &catalog(&[&a, &b])).unwrap();

        assert_eq!(plan.total, Money::from_cents(2500));
        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.lines[0].product_id, a.id);
        assert_eq!(plan.lines[0].unit_price, Money::from_cents(1000));
    }

    #[test]
    fn test_insufficient_stock_rejected() {
        let p = snapshot(3, 100);
        let err = plan(&[item(&p, 5)], &catalog(&[&p])).unwrap_err();
        assert_eq!(
            err,
            CheckoutError::InsufficientStock {
                product_id: p.id,
                name: "Widget".to_string(),
                requested: 5,
                available: 3,
            }
        );
    }

    #[test]
    fn test_exact_stock_accepted() {
        let p = snapshot(3, 100);
        let plan = plan(&[item(&p, 3)], &catalog(&[&p])).unwrap();
        assert_eq!(
            plan.stock,
            vec![StockMovement {
                product_id: p.id,
                quantity: 3
            }]
        );
    }

    #[test]
    fn test_unknown_product_reported_before_stock() {
        let short = snapshot(0, 100);
        let missing = ProductId::new();
        let items = [
            item(&short, 1),
            CheckoutItem {
                product_id: missing,
                quantity: 1,
            },
        ];
        assert_eq!(
            plan(&items, &catalog(&[&short])),
            Err(CheckoutError::ProductNotFound(missing))
        );
    }

    #[test]
    fn test_inactive_product_rejected() {
        let mut p = snapshot(5, 100);
        p.is_active = false;
        assert_eq!(
            plan(&[item(&p, 1)], &catalog(&[&p])),
            Err(CheckoutError::ProductUnavailable(p.id))
        );
    }

    #[test]
    fn test_duplicates_merged_before_stock_check() {
        let p = snapshot(4, 100);
        let err = plan(&[item(&p, 3), item(&p, 2)], &catalog(&[&p])).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock { requested: 5, .. }
        ));

        let ok = plan(&[item(&p, 1), item(&p, 2)], &catalog(&[&p])).unwrap();
        assert_eq!(ok.lines.len(), 1);
        assert_eq!(ok.lines[0].quantity, 3);
    }

    #[test]
    fn test_empty_and_zero_quantity() {
        let p = snapshot(4, 100);
        assert_eq!(plan(&[], &catalog(&[&p])), Err(CheckoutError::EmptyOrder));
        assert!(matches!(
            plan(&[item(&p, 0)], &catalog(&[&p])),
            Err(CheckoutError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn test_items_from_cart() {
        let mut cart = Cart::new(crate::types::UserId::new(), chrono::Utc::now());
        let p = ProductId::new();
        cart.add_line(p, 2, Money::from_cents(100)).unwrap();
        assert_eq!(
            items_from_cart(&cart),
            vec![CheckoutItem {
                product_id: p,
                quantity: 2
            }]
        );
    }
}
