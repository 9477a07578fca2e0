//! Cart operations for the authenticated caller.
//!
//! Each mutation loads the [`Cart`] aggregate, applies one line operation and
//! saves the result, so the stored total is always the aggregate's
//! recomputed total.

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use ventas_core::cart::{Cart, CartError};
use ventas_core::{ProductId, UserId};

use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::models::cart::CartView;

#[derive(Debug, Error)]
pub enum CartServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("cart already exists")]
    AlreadyExists,

    #[error("product {0} is not available for sale")]
    Unavailable(ProductId),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CartServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(_) => Self::AlreadyExists,
            other => Self::Repository(other),
        }
    }
}

pub struct CartService<'a> {
    pool: &'a PgPool,
    carts: CartRepository<'a>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            carts: CartRepository::new(pool),
        }
    }

    /// Create the caller's empty cart.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::AlreadyExists` if the user already has one.
    #[instrument(skip(self))]
    pub async fn create(&self, user_id: UserId) -> Result<CartView, CartServiceError> {
        if self.carts.get_by_user(user_id).await?.is_some() {
            return Err(CartServiceError::AlreadyExists);
        }
        let cart = Cart::new(user_id, Utc::now());
        self.carts.create(&cart).await?;

        tracing::info!(cart_id = %cart.id(), "cart created");
        self.view(&cart).await
    }

    /// The caller's cart with products expanded.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::NotFound` if the user has no cart.
    pub async fn get(&self, user_id: UserId) -> Result<CartView, CartServiceError> {
        let cart = self.load(user_id).await?;
        self.view(&cart).await
    }

    /// Add `quantity` of a product, merging into an existing line.
    ///
    /// The product is checked before the cart is touched.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::NotFound` for an unknown product or a
    /// missing cart, and `CartServiceError::Unavailable` for a deactivated
    /// product.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView, CartServiceError> {
        let product = ProductRepository::new(self.pool)
            .get(product_id)
            .await?
            .ok_or(CartServiceError::NotFound("product"))?;
        if !product.is_active {
            return Err(CartServiceError::Unavailable(product_id));
        }

        let mut cart = self.load(user_id).await?;
        cart.add_line(product_id, quantity, product.price)?;
        self.save(&cart).await
    }

    /// Replace the quantity of a line already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the product is not in the cart.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView, CartServiceError> {
        let mut cart = self.load(user_id).await?;
        cart.set_quantity(product_id, quantity)?;
        self.save(&cart).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the product is not in the cart.
    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<CartView, CartServiceError> {
        let mut cart = self.load(user_id).await?;
        cart.remove_line(product_id)?;
        self.save(&cart).await
    }

    /// Empty the cart. The cart itself is kept.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::NotFound` if the user has no cart.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<CartView, CartServiceError> {
        let mut cart = self.load(user_id).await?;
        cart.clear();
        self.save(&cart).await
    }

    async fn load(&self, user_id: UserId) -> Result<Cart, CartServiceError> {
        self.carts
            .get_by_user(user_id)
            .await?
            .ok_or(CartServiceError::NotFound("cart"))
    }

    async fn save(&self, cart: &Cart) -> Result<CartView, CartServiceError> {
        self.carts.save(cart).await.map_err(|e| match e {
            RepositoryError::NotFound => CartServiceError::NotFound("cart"),
            other => other.into(),
        })?;
        self.view(cart).await
    }

    async fn view(&self, cart: &Cart) -> Result<CartView, CartServiceError> {
        let ids: Vec<ProductId> = cart.lines().iter().map(|l| l.product_id).collect();
        let products = ProductRepository::new(self.pool).summaries(&ids).await?;
        Ok(CartView::new(cart, &products))
    }
}
