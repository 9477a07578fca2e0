//! Catalog field rules: categories, products, partial updates and search.

use thiserror::Error;

use crate::types::{CategoryId, Money};

/// Number of products returned by the top-sellers query.
pub const TOP_SELLERS_LIMIT: i64 = 5;

/// Largest stock level a product may hold, the ceiling of an `INTEGER` column.
pub const MAX_STOCK: u32 = i32::MAX.unsigned_abs();

const MAX_NAME_LENGTH: usize = 120;
const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Field validation failures for catalog input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("stock must be at most {MAX_STOCK} (got {0})")]
    StockTooLarge(u32),

    #[error("a search query is required")]
    MissingQuery,
}

/// Name and description of a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFields {
    pub name: String,
    pub description: String,
}

impl CategoryFields {
    /// Trim and check both fields.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is blank or too long.
    pub fn validated(name: &str, description: &str) -> Result<Self, CatalogError> {
        Ok(Self {
            name: required("name", name, MAX_NAME_LENGTH)?,
            description: required("description", description, MAX_DESCRIPTION_LENGTH)?,
        })
    }
}

/// Every editable product field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFields {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub category_id: CategoryId,
    /// Stored upload name, if the product has an image.
    pub image: Option<String>,
}

impl ProductFields {
    /// Trim text fields and check them.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or description is blank or too long, or
    /// if the stock is above [`MAX_STOCK`].
    pub fn validate(&mut self) -> Result<(), CatalogError> {
        if self.stock > MAX_STOCK {
            return Err(CatalogError::StockTooLarge(self.stock));
        }
        self.name = required("name", &self.name, MAX_NAME_LENGTH)?;
        self.description = required("description", &self.description, MAX_DESCRIPTION_LENGTH)?;
        Ok(())
    }
}

/// A partial product update. `None` leaves the current value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<u32>,
    pub category_id: Option<CategoryId>,
    /// Replaces the image only when a new upload was supplied.
    pub image: Option<String>,
}

impl ProductPatch {
    /// Whether the patch would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.category_id.is_none()
            && self.image.is_none()
    }

    /// Overwrite the supplied fields of `fields`, then re-validate.
    ///
    /// Returns the image the patch replaced, if any, so the caller can clean
    /// it up.
    ///
    /// # Errors
    ///
    /// Returns an error if the patched fields fail validation. `fields` may
    /// be partially updated in that case.
    pub fn apply(self, fields: &mut ProductFields) -> Result<Option<String>, CatalogError> {
        if let Some(name) = self.name {
            fields.name = name;
        }
        if let Some(description) = self.description {
            fields.description = description;
        }
        if let Some(price) = self.price {
            fields.price = price;
        }
        if let Some(stock) = self.stock {
            fields.stock = stock;
        }
        if let Some(category_id) = self.category_id {
            fields.category_id = category_id;
        }
        let replaced = match self.image {
            Some(image) => fields.image.replace(image),
            None => None,
        };
        fields.validate()?;
        Ok(replaced)
    }
}

/// Build an `ILIKE` pattern for a case-insensitive substring search.
///
/// `%`, `_` and `\` in the term are escaped so they match literally.
///
/// # Errors
///
/// Returns [`CatalogError::MissingQuery`] if no term, or only whitespace,
/// was given.
pub fn search_pattern(query: Option<&str>) -> Result<String, CatalogError> {
    let term = query.map(str::trim).filter(|t| !t.is_empty());
    let term = term.ok_or(CatalogError::MissingQuery)?;

    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Ok(pattern)
}

fn required(field: &'static str, value: &str, max: usize) -> Result<String, CatalogError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::Required(field));
    }
    if value.chars().count() > max {
        return Err(CatalogError::TooLong { field, max });
    }
    Ok(value.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fields() -> ProductFields {
        ProductFields {
            name: "Laptop".to_string(),
            description: "14 inch".to_string(),
            price: Money::from_cents(99_900),
            stock: 4,
            category_id: CategoryId::new(),
            image: Some("old.png".to_string()),
        }
    }

    #[test]
    fn test_patch_only_overwrites_supplied_fields() {
        let mut f = fields();
        let patch = ProductPatch {
            stock: Some(0),
            ..ProductPatch::default()
        };
        let replaced = patch.apply(&mut f).unwrap();

        assert_eq!(replaced, None);
        assert_eq!(f.stock, 0);
        assert_eq!(f.name, "Laptop");
        assert_eq!(f.image.as_deref(), Some("old.png"));
    }

    #[test]
    fn test_patch_image_replaces_and_returns_old() {
        let mut f = fields();
        let patch = ProductPatch {
            image: Some("new.png".to_string()),
            ..ProductPatch::default()
        };
        assert_eq!(patch.apply(&mut f).unwrap().as_deref(), Some("old.png"));
        assert_eq!(f.image.as_deref(), Some("new.png"));
    }

    #[test]
    fn test_patch_blank_name_rejected() {
        let mut f = fields();
        let patch = ProductPatch {
            name: Some("   ".to_string()),
            ..ProductPatch::default()
        };
        assert_eq!(patch.apply(&mut f), Err(CatalogError::Required("name")));
    }

    #[test]
    fn test_stock_capped_at_integer_column() {
        let mut f = fields();
        f.stock = MAX_STOCK;
        assert!(f.validate().is_ok());

        f.stock = u32::MAX;
        assert_eq!(f.validate(), Err(CatalogError::StockTooLarge(u32::MAX)));

        let patch = ProductPatch {
            stock: Some(MAX_STOCK + 1),
            ..ProductPatch::default()
        };
        assert_eq!(
            patch.apply(&mut fields()),
            Err(CatalogError::StockTooLarge(MAX_STOCK + 1))
        );
    }

    #[test]
    fn test_empty_patch() {
        assert!(ProductPatch::default().is_empty());
    }

    #[test]
    fn test_category_fields_trimmed() {
        let c = CategoryFields::validated("  Tech ", " Gadgets ").unwrap();
        assert_eq!(c.name, "Tech");
        assert_eq!(c.description, "Gadgets");
        assert!(CategoryFields::validated("", "x").is_err());
    }

    #[test]
    fn test_search_pattern() {
        assert_eq!(search_pattern(Some(" lap ")).unwrap(), "%lap%");
        assert_eq!(search_pattern(Some("50%_off")).unwrap(), "%50\\%\\_off%");
        assert_eq!(search_pattern(None), Err(CatalogError::MissingQuery));
        assert_eq!(search_pattern(Some("  ")), Err(CatalogError::MissingQuery));
    }
}
