//! Business services sitting between the route handlers and the repositories.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod receipt;
pub mod tokens;
pub mod uploads;

pub use auth::{AuthError, AuthService};
pub use cart::{CartService, CartServiceError};
pub use catalog::{CatalogService, CatalogServiceError};
pub use checkout::{CheckoutService, OrderError};
pub use receipt::ReceiptError;
pub use tokens::{Claims, TokenError, TokenService};
pub use uploads::{UploadError, UploadStore};
