//! Cross-module scenarios: carts feed checkout plans, plans issue invoices,
//! and cancelled invoices give their stock back.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;

use ventas_core::access::{ADMIN_ONLY, ANY_ROLE, is_permitted};
use ventas_core::cart::Cart;
use ventas_core::checkout::{CheckoutError, CheckoutItem, ProductSnapshot, items_from_cart, plan};
use ventas_core::invoice::{Invoice, InvoiceError, StatusChange, StockMovement};
use ventas_core::{InvoiceStatus, Money, ProductId, UserId, UserRole};

fn money(cents: i64) -> Money {
    Money::from_cents(cents)
}

fn snapshot(id: ProductId, name: &str, cents: i64, stock: u32) -> ProductSnapshot {
    ProductSnapshot {
        id,
        name: name.to_owned(),
        price: money(cents),
        stock,
        is_active: true,
    }
}

fn catalog(products: &[ProductSnapshot]) -> HashMap<ProductId, ProductSnapshot> {
    products.iter().map(|p| (p.id, p.clone())).collect()
}

#[test]
fn test_cart_total_follows_every_edit() {
    let (a, b) = (ProductId::new(), ProductId::new());
    let mut cart = Cart::new(UserId::new(), Utc::now());

    cart.add_line(a, 2, money(1000)).unwrap();
    cart.add_line(b, 1, money(500)).unwrap();
    assert_eq!(cart.total(), money(2500));

    cart.remove_line(a).unwrap();
    assert_eq!(cart.total(), money(500));

    cart.clear();
    assert!(cart.is_empty());
    assert_eq!(cart.total(), Money::ZERO);
}

#[test]
fn test_adding_twice_merges_into_one_line() {
    let a = ProductId::new();
    let mut cart = Cart::new(UserId::new(), Utc::now());

    cart.add_line(a, 1, money(300)).unwrap();
    cart.add_line(a, 2, money(999)).unwrap();

    assert_eq!(cart.lines().len(), 1);
    assert_eq!(cart.lines()[0].quantity, 3);
    // the first price snapshot wins
    assert_eq!(cart.total(), money(900));
}

#[test]
fn test_insufficient_stock_plans_nothing() {
    let a = ProductId::new();
    let products = catalog(&[snapshot(a, "Lamp", 1500, 3)]);

    let err = plan(
        &[CheckoutItem {
            product_id: a,
            quantity: 5,
        }],
        &products,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::InsufficientStock {
            requested: 5,
            available: 3,
            ..
        }
    ));
    assert_eq!(products[&a].stock, 3);
}

#[test]
fn test_paid_cart_checkout_prices_at_current_price() {
    let (a, b) = (ProductId::new(), ProductId::new());
    let mut cart = Cart::new(UserId::new(), Utc::now());
    cart.add_line(a, 2, money(1000)).unwrap();
    cart.add_line(b, 1, money(500)).unwrap();

    // A's price went up after it was put in the cart.
    let products = catalog(&[snapshot(a, "A", 1200, 10), snapshot(b, "B", 500, 1)]);
    let checkout = plan(&items_from_cart(&cart), &products).unwrap();
    assert_eq!(checkout.total, money(2900));

    let invoice = Invoice::issue(
        cart.user_id(),
        checkout.lines.clone(),
        InvoiceStatus::Paid,
        Utc::now(),
    );
    assert_eq!(invoice.total(), checkout.total);
    assert_eq!(invoice.status(), InvoiceStatus::Paid);

    let mut taken: Vec<StockMovement> = checkout.stock;
    taken.sort_by_key(|m| m.product_id);
    let expected: HashMap<ProductId, u32> = [(a, 2), (b, 1)].into_iter().collect();
    for movement in taken {
        assert_eq!(expected[&movement.product_id], movement.quantity);
    }
}

#[test]
fn test_cancelling_pending_invoice_restores_its_quantities() {
    let c = ProductId::new();
    let products = catalog(&[snapshot(c, "C", 250, 10)]);
    let checkout = plan(
        &[CheckoutItem {
            product_id: c,
            quantity: 4,
        }],
        &products,
    )
    .unwrap();

    let mut invoice = Invoice::issue(
        UserId::new(),
        checkout.lines,
        InvoiceStatus::Pending,
        Utc::now(),
    );
    let restock = invoice.cancel(Utc::now()).unwrap();

    assert_eq!(invoice.status(), InvoiceStatus::Cancelled);
    assert_eq!(
        restock,
        vec![StockMovement {
            product_id: c,
            quantity: 4
        }]
    );

    assert_eq!(
        invoice.cancel(Utc::now()),
        Err(InvoiceError::AlreadyCancelled)
    );
}

#[test]
fn test_paid_invoice_is_frozen() {
    let c = ProductId::new();
    let products = catalog(&[snapshot(c, "C", 250, 10)]);
    let checkout = plan(
        &[CheckoutItem {
            product_id: c,
            quantity: 1,
        }],
        &products,
    )
    .unwrap();
    let mut invoice = Invoice::issue(
        UserId::new(),
        checkout.lines,
        InvoiceStatus::Pending,
        Utc::now(),
    );

    assert_eq!(
        invoice.transition(InvoiceStatus::Paid, Utc::now()),
        Ok(StatusChange::Paid)
    );
    assert_eq!(invoice.cancel(Utc::now()), Err(InvoiceError::AlreadyPaid));
    assert!(matches!(
        invoice.transition(InvoiceStatus::Pending, Utc::now()),
        Err(InvoiceError::Frozen { .. })
    ));
    assert_eq!(invoice.status(), InvoiceStatus::Paid);
}

#[test]
fn test_role_policy() {
    assert!(is_permitted(UserRole::Client, ANY_ROLE));
    assert!(is_permitted(UserRole::Admin, ADMIN_ONLY));
    assert!(!is_permitted(UserRole::Client, ADMIN_ONLY));
}

#[test]
fn test_money_input_rules() {
    assert!(Money::parse(Decimal::new(-1, 2)).is_err());
    assert!(Money::parse(Decimal::new(1, 3)).is_err());
    assert_eq!(Money::parse(Decimal::new(1999, 2)).unwrap(), money(1999));
}
