//! Product models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use ventas_core::catalog::ProductFields;
use ventas_core::checkout::ProductSnapshot;
use ventas_core::{CategoryId, Money, ProductId};

use super::CategorySummary;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Current price. Carts and invoices keep their own snapshots.
    pub price: Money,
    /// Units on hand.
    pub stock: u32,
    /// Cumulative units sold, used for top-seller ranking.
    pub sold: u32,
    pub category_id: CategoryId,
    /// Stored upload name of the product image.
    pub image: Option<String>,
    /// Soft-delete flag.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The editable fields, for applying a partial update.
    #[must_use]
    pub fn fields(&self) -> ProductFields {
        ProductFields {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            stock: self.stock,
            category_id: self.category_id,
            image: self.image.clone(),
        }
    }

    /// The state checkout validates against.
    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
            stock: self.stock,
            is_active: self.is_active,
        }
    }

    #[must_use]
    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
            stock: self.stock,
            image: self.image.clone(),
            is_active: self.is_active,
        }
    }
}

/// A product with its category expanded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductWithCategory {
    #[serde(flatten)]
    pub product: Product,
    pub category: CategorySummary,
}

/// Product as embedded in cart lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub image: Option<String>,
    pub is_active: bool,
}
