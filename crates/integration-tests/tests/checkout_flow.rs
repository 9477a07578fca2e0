//! Transactional workflows against a real database.
//!
//! Every test returns early unless `VENTAS_TEST_DATABASE_URL` is set. Names
//! are randomised so runs can share one database.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use sqlx::PgPool;

use ventas_core::catalog::{CategoryFields, MAX_STOCK, ProductFields, ProductPatch};
use ventas_core::checkout::{CheckoutError, CheckoutItem};
use ventas_core::invoice::InvoiceError;
use ventas_core::{CategoryId, InvoiceStatus, Money, ProductId, UserRole};
use ventas_integration_tests::{test_pool, unique};
use ventas_server::db::{CategoryRepository, InvoiceRepository, ProductRepository};
use ventas_server::models::{Category, Product, User};
use ventas_server::services::auth::Registration;
use ventas_server::services::{
    AuthService, CartService, CartServiceError, CatalogService, CatalogServiceError,
    CheckoutService, OrderError,
};

async fn client(pool: &PgPool) -> User {
    let handle = unique("buyer");
    AuthService::new(pool)
        .register(
            Registration {
                name: "Test Buyer".to_owned(),
                username: handle.clone(),
                email: format!("{handle}@example.com"),
                password: "correct horse battery".to_owned(),
                profile_picture: None,
            },
            UserRole::Client,
        )
        .await
        .unwrap()
}

async fn category(pool: &PgPool) -> Category {
    let fields = CategoryFields::validated(&unique("cat"), "integration test category").unwrap();
    CatalogService::new(pool, None)
        .add_category(&fields)
        .await
        .unwrap()
}

async fn product(pool: &PgPool, category_id: CategoryId, cents: i64, stock: u32) -> Product {
    CatalogService::new(pool, None)
        .add_product(ProductFields {
            name: unique("product"),
            description: "integration test product".to_owned(),
            price: Money::from_cents(cents),
            stock,
            category_id,
            image: None,
        })
        .await
        .unwrap()
}

async fn reload(pool: &PgPool, id: ProductId) -> Product {
    ProductRepository::new(pool).get(id).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_payment_takes_stock_and_empties_cart() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = client(&pool).await;
    let cat = category(&pool).await;
    let a = product(&pool, cat.id, 1000, 5).await;
    let b = product(&pool, cat.id, 500, 3).await;

    let carts = CartService::new(&pool);
    carts.create(user.id).await.unwrap();
    carts.add(user.id, a.id, 2).await.unwrap();
    let cart = carts.add(user.id, b.id, 1).await.unwrap();
    assert_eq!(cart.total, Money::from_cents(2500));

    let invoice = CheckoutService::new(&pool).pay_cart(user.id).await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.total, Money::from_cents(2500));
    assert_eq!(invoice.lines.len(), 2);

    let cart = carts.get(user.id).await.unwrap();
    assert!(cart.lines.is_empty());
    assert_eq!(cart.total, Money::ZERO);

    let a = reload(&pool, a.id).await;
    let b = reload(&pool, b.id).await;
    assert_eq!((a.stock, a.sold), (3, 2));
    assert_eq!((b.stock, b.sold), (2, 1));
}

#[tokio::test]
async fn test_paying_an_empty_cart_is_rejected() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = client(&pool).await;
    CartService::new(&pool).create(user.id).await.unwrap();

    let err = CheckoutService::new(&pool)
        .pay_cart(user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Checkout(CheckoutError::EmptyOrder)));
}

#[tokio::test]
async fn test_paying_without_cart_is_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = client(&pool).await;

    let err = CheckoutService::new(&pool)
        .pay_cart(user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound("cart")));
}

#[tokio::test]
async fn test_insufficient_stock_leaves_everything_untouched() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = client(&pool).await;
    let cat = category(&pool).await;
    let scarce = product(&pool, cat.id, 1500, 3).await;

    let err = CheckoutService::new(&pool)
        .create_invoice(
            user.id,
            &[CheckoutItem {
                product_id: scarce.id,
                quantity: 5,
            }],
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrderError::Checkout(CheckoutError::InsufficientStock { .. })
    ));
    assert_eq!(reload(&pool, scarce.id).await.stock, 3);
    assert!(
        InvoiceRepository::new(&pool)
            .list_for_user(user.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_cancel_restores_stock_once() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = client(&pool).await;
    let cat = category(&pool).await;
    let c = product(&pool, cat.id, 250, 10).await;
    let checkout = CheckoutService::new(&pool);

    let invoice = checkout
        .create_invoice(
            user.id,
            &[CheckoutItem {
                product_id: c.id,
                quantity: 4,
            }],
        )
        .await
        .unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(reload(&pool, c.id).await.stock, 6);

    let cancelled = checkout.cancel_invoice(invoice.id).await.unwrap();
    assert_eq!(cancelled.status, InvoiceStatus::Cancelled);
    let restored = reload(&pool, c.id).await;
    assert_eq!((restored.stock, restored.sold), (10, 0));

    let err = checkout.cancel_invoice(invoice.id).await.unwrap_err();
    assert!(matches!(
        err,
        OrderError::Invoice(InvoiceError::AlreadyCancelled)
    ));
    assert_eq!(reload(&pool, c.id).await.stock, 10);
}

#[tokio::test]
async fn test_status_update_follows_state_machine() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = client(&pool).await;
    let cat = category(&pool).await;
    let p = product(&pool, cat.id, 700, 4).await;
    let checkout = CheckoutService::new(&pool);

    let invoice = checkout
        .create_invoice(
            user.id,
            &[
                CheckoutItem {
                    product_id: p.id,
                    quantity: 1,
                },
                CheckoutItem {
                    product_id: p.id,
                    quantity: 1,
                },
            ],
        )
        .await
        .unwrap();
    // duplicates are merged into one line
    assert_eq!(invoice.lines.len(), 1);
    assert_eq!(invoice.lines[0].quantity, 2);

    let unchanged = checkout
        .update_status(invoice.id, InvoiceStatus::Pending)
        .await
        .unwrap();
    assert_eq!(unchanged.status, InvoiceStatus::Pending);

    let paid = checkout
        .update_status(invoice.id, InvoiceStatus::Paid)
        .await
        .unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);

    let err = checkout
        .update_status(invoice.id, InvoiceStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Invoice(InvoiceError::Frozen { .. })));
    assert_eq!(reload(&pool, p.id).await.stock, 2);
}

#[tokio::test]
async fn test_deactivated_product_cannot_be_added_to_cart() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = client(&pool).await;
    let cat = category(&pool).await;
    let p = product(&pool, cat.id, 100, 1).await;
    CatalogService::new(&pool, None)
        .set_product_active(p.id, false)
        .await
        .unwrap();

    let carts = CartService::new(&pool);
    carts.create(user.id).await.unwrap();
    let err = carts.add(user.id, p.id, 1).await.unwrap_err();
    assert!(matches!(err, CartServiceError::Unavailable(id) if id == p.id));
}

#[tokio::test]
async fn test_second_cart_is_a_conflict() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = client(&pool).await;
    let carts = CartService::new(&pool);

    carts.create(user.id).await.unwrap();
    let err = carts.create(user.id).await.unwrap_err();
    assert!(matches!(err, CartServiceError::AlreadyExists));
}

#[tokio::test]
async fn test_category_deactivation_moves_products_to_fallback() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let fallback = category(&pool).await;
    let doomed = category(&pool).await;
    let p = product(&pool, doomed.id, 100, 1).await;
    let catalog = CatalogService::new(&pool, Some(fallback.id));

    let deactivated = catalog.deactivate_category(doomed.id).await.unwrap();
    assert!(!deactivated.is_active);
    assert_eq!(reload(&pool, p.id).await.category_id, fallback.id);

    let err = catalog.deactivate_category(fallback.id).await.unwrap_err();
    assert!(matches!(err, CatalogServiceError::FallbackCategory));
}

#[tokio::test]
async fn test_deactivation_commits_when_no_fallback_is_configured() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let cat = category(&pool).await;
    let p = product(&pool, cat.id, 100, 1).await;

    let err = CatalogService::new(&pool, None)
        .deactivate_category(cat.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogServiceError::FallbackUnavailable(_)));

    let reloaded = CategoryRepository::new(&pool).get(cat.id).await.unwrap().unwrap();
    assert!(!reloaded.is_active);
    assert_eq!(reload(&pool, p.id).await.category_id, cat.id);
}

#[tokio::test]
async fn test_deactivation_commits_when_fallback_is_inactive() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let fallback = category(&pool).await;
    let cat = category(&pool).await;
    let p = product(&pool, cat.id, 100, 1).await;
    CatalogService::new(&pool, None)
        .deactivate_category(fallback.id)
        .await
        .unwrap_err();

    let err = CatalogService::new(&pool, Some(fallback.id))
        .deactivate_category(cat.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogServiceError::FallbackUnavailable(_)));

    let reloaded = CategoryRepository::new(&pool).get(cat.id).await.unwrap().unwrap();
    assert!(!reloaded.is_active);
    assert_eq!(reload(&pool, p.id).await.category_id, cat.id);
}

#[tokio::test]
async fn test_stock_limits_hold_at_the_integer_ceiling() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = client(&pool).await;
    let cat = category(&pool).await;
    let p = product(&pool, cat.id, 100, MAX_STOCK).await;
    let catalog = CatalogService::new(&pool, None);
    let checkout = CheckoutService::new(&pool);

    let err = catalog
        .update_product(
            p.id,
            ProductPatch {
                stock: Some(MAX_STOCK + 1),
                ..ProductPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogServiceError::Invalid(_)));

    let invoice = checkout
        .create_invoice(
            user.id,
            &[CheckoutItem {
                product_id: p.id,
                quantity: 3,
            }],
        )
        .await
        .unwrap();
    catalog
        .update_product(
            p.id,
            ProductPatch {
                stock: Some(MAX_STOCK),
                ..ProductPatch::default()
            },
        )
        .await
        .unwrap();

    checkout.cancel_invoice(invoice.id).await.unwrap();
    let restored = reload(&pool, p.id).await;
    assert_eq!((restored.stock, restored.sold), (MAX_STOCK, 0));
}
