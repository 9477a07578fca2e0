//! Domain models and response views.

pub mod cart;
pub mod category;
pub mod invoice;
pub mod product;
pub mod user;

pub use cart::CartView;
pub use category::{Category, CategorySummary};
pub use invoice::InvoiceView;
pub use product::{Product, ProductSummary, ProductWithCategory};
pub use user::{CurrentUser, NewUser, User, UserChanges, UserSummary};
