//! Shopping cart aggregate.
//!
//! A [`Cart`] owns an ordered list of [`CartLine`]s and a `total`. The only
//! way to change the lines is through the methods on `Cart`, and each of them
//! finishes by recomputing the total from scratch, so
//! `total == Σ(quantity × unit_price)` holds after every mutation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::types::{CartId, Money, ProductId, UserId};

/// Largest quantity a single line may hold.
pub const MAX_LINE_QUANTITY: u32 = 1_000_000;

/// Errors raised by cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantity outside `1..=MAX_LINE_QUANTITY`.
    #[error("quantity must be between 1 and {MAX_LINE_QUANTITY} (got {0})")]
    InvalidQuantity(u64),

    /// The product is not a line in this cart.
    #[error("product {0} is not in the cart")]
    LineNotFound(ProductId),
}

/// One product in a cart, priced at the moment it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price snapshot taken when the product was first added.
    pub unit_price: Money,
}

impl CartLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// A user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    id: CartId,
    user_id: UserId,
    lines: Vec<CartLine>,
    total: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    /// Create an empty cart for `user_id`.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: CartId::new(),
            user_id,
            lines: Vec::new(),
            total: Money::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a cart from stored parts.
    ///
    /// The total is recomputed from the lines; any stored total is ignored.
    #[must_use]
    pub fn restore(
        id: CartId,
        user_id: UserId,
        lines: Vec<CartLine>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let mut cart = Self {
            id,
            user_id,
            lines,
            total: Money::ZERO,
            created_at,
            updated_at,
        };
        cart.reconcile();
        cart
    }

    #[must_use]
    pub const fn id(&self) -> CartId {
        self.id
    }

    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub const fn total(&self) -> Money {
        self.total
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Find the line for `product_id`.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    /// Add `quantity` units of a product.
    ///
    /// If the product is already a line its quantity grows and its original
    /// price snapshot is kept. Otherwise a new line is appended at
    /// `current_price`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] if `quantity` is zero or the
    /// merged quantity would exceed [`MAX_LINE_QUANTITY`].
    pub fn add_line(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        current_price: Money,
    ) -> Result<(), CartError> {
        check_quantity(u64::from(quantity))?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product_id) {
            let merged = u64::from(line.quantity) + u64::from(quantity);
            line.quantity = check_quantity(merged)?;
        } else {
            self.lines.push(CartLine {
                product_id,
                quantity,
                unit_price: current_price,
            });
        }

        self.reconcile();
        Ok(())
    }

    /// Replace the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for an out-of-range quantity and
    /// [`CartError::LineNotFound`] if the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        let quantity = check_quantity(u64::from(quantity))?;
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or(CartError::LineNotFound(product_id))?;
        line.quantity = quantity;

        self.reconcile();
        Ok(())
    }

    /// Remove the line for `product_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] if the product is not in the cart.
    pub fn remove_line(&mut self, product_id: ProductId) -> Result<(), CartError> {
        let index = self
            .lines
            .iter()
            .position(|l| l.product_id == product_id)
            .ok_or(CartError::LineNotFound(product_id))?;
        self.lines.remove(index);

        self.reconcile();
        Ok(())
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.reconcile();
    }

    fn reconcile(&mut self) {
        self.total = self.lines.iter().map(CartLine::line_total).sum();
    }
}

fn check_quantity(quantity: u64) -> Result<u32, CartError> {
    match u32::try_from(quantity) {
        Ok(q) if (1..=MAX_LINE_QUANTITY).contains(&q) => Ok(q),
        _ => Err(CartError::InvalidQuantity(quantity)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cart() -> Cart {
        Cart::new(UserId::new(), Utc::now())
    }

    fn sum_of_lines(cart: &Cart) -> Money {
        cart.lines()
            .iter()
            .map(|l| l.unit_price.times(l.quantity))
            .sum()
    }

    #[test]
    fn test_two_line_scenario() {
        let (a, b) = (ProductId::new(), ProductId::new());
        let mut cart = cart();

        cart.add_line(a, 2, Money::from_cents(1000)).unwrap();
        cart.add_line(b, 1, Money::from_cents(500)).unwrap();
        assert_eq!(cart.total(), Money::from_cents(2500));

        cart.remove_line(a).unwrap();
        assert_eq!(cart.total(), Money::from_cents(500));

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Money::ZERO);
    }

    #[test]
    fn test_add_same_product_merges() {
        let a = ProductId::new();
        let mut cart = cart();

        cart.add_line(a, 2, Money::from_cents(1000)).unwrap();
        cart.add_line(a, 3, Money::from_cents(1200)).unwrap();

        assert_eq!(cart.lines().len(), 1);
        let line = cart.line(a).unwrap();
        assert_eq!(line.quantity, 5);
        // snapshot from the first add is kept
        assert_eq!(line.unit_price, Money::from_cents(1000));
        assert_eq!(cart.total(), Money::from_cents(5000));
    }

    #[test]
    fn test_set_quantity() {
        let a = ProductId::new();
        let mut cart = cart();
        cart.add_line(a, 1, Money::from_cents(250)).unwrap();

        cart.set_quantity(a, 4).unwrap();
        assert_eq!(cart.total(), Money::from_cents(1000));

        assert_eq!(cart.set_quantity(a, 0), Err(CartError::InvalidQuantity(0)));
        assert_eq!(cart.total(), Money::from_cents(1000));
    }

    #[test]
    fn test_missing_line_errors() {
        let mut cart = cart();
        let missing = ProductId::new();
        assert_eq!(
            cart.set_quantity(missing, 1),
            Err(CartError::LineNotFound(missing))
        );
        assert_eq!(cart.remove_line(missing), Err(CartError::LineNotFound(missing)));
    }

    #[test]
    fn test_zero_quantity_add_rejected() {
        let mut cart = cart();
        assert!(cart.add_line(ProductId::new(), 0, Money::from_cents(100)).is_err());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_merge_overflow_rejected_without_change() {
        let a = ProductId::new();
        let mut cart = cart();
        cart.add_line(a, MAX_LINE_QUANTITY, Money::from_cents(1)).unwrap();
        assert!(cart.add_line(a, 1, Money::from_cents(1)).is_err());
        assert_eq!(cart.line(a).unwrap().quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_restore_recomputes_total() {
        let lines = vec![
            CartLine {
                product_id: ProductId::new(),
                quantity: 3,
                unit_price: Money::from_cents(333),
            },
            CartLine {
                product_id: ProductId::new(),
                quantity: 1,
                unit_price: Money::from_cents(1),
            },
        ];
        let now = Utc::now();
        let cart = Cart::restore(CartId::new(), UserId::new(), lines, now, now);
        assert_eq!(cart.total(), Money::from_cents(1000));
    }

    #[test]
    fn test_total_reconciles_after_mixed_operations() {
        let ids: Vec<ProductId> = (0..4).map(|_| ProductId::new()).collect();
        let mut cart = cart();

        for (i, id) in ids.iter().enumerate() {
            let cents = 199 * (i64::try_from(i).unwrap() + 1);
            cart.add_line(*id, 1, Money::from_cents(cents)).unwrap();
            assert_eq!(cart.total(), sum_of_lines(&cart));
        }
        cart.add_line(ids[1], 7, Money::from_cents(1)).unwrap();
        assert_eq!(cart.total(), sum_of_lines(&cart));
        cart.set_quantity(ids[2], 9).unwrap();
        assert_eq!(cart.total(), sum_of_lines(&cart));
        cart.remove_line(ids[0]).unwrap();
        assert_eq!(cart.total(), sum_of_lines(&cart));
    }

    #[test]
    fn test_largest_line_fits_total_columns() {
        // carts.total and invoices.total are NUMERIC(24, 2)
        let line = Money::MAX.times(MAX_LINE_QUANTITY);
        assert_eq!(line.to_string(), "9999999999990000.00");
        assert!(line.amount().trunc().to_string().len() <= 22);
    }
}
