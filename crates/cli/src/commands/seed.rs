//! `ventas seed`: load a catalog from YAML.
//!
//! ```yaml
//! categories:
//!   - name: Keyboards
//!     description: Mechanical and membrane keyboards
//!     products:
//!       - name: Tenkeyless
//!         description: 87 keys, brown switches
//!         price: "59.90"
//!         stock: 12
//! ```
//!
//! Categories whose name already exists are skipped together with their
//! products, so running the same file twice is harmless.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};

use ventas_core::Money;
use ventas_core::catalog::{CategoryFields, ProductFields};
use ventas_server::db::CategoryRepository;
use ventas_server::services::CatalogService;

use super::CliError;

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    categories: Vec<SeedCategory>,
}

#[derive(Debug, Deserialize)]
struct SeedCategory {
    name: String,
    description: String,
    #[serde(default)]
    products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
struct SeedProduct {
    name: String,
    description: String,
    price: Decimal,
    stock: u32,
}

/// Counts reported after seeding.
#[derive(Debug, Default, PartialEq, Eq)]
struct SeedSummary {
    categories: usize,
    products: usize,
    skipped: usize,
}

/// Seed categories and products from `path`.
///
/// The whole file is parsed and validated before anything is written.
///
/// # Errors
///
/// Returns `CliError::Io` if the file cannot be read, `CliError::Invalid`
/// for malformed YAML or field values, and `CliError::Catalog` if a write
/// fails.
pub async fn catalog(pool: &PgPool, path: &Path) -> Result<(), CliError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let file = parse(&content)?;

    info!(path = %path.display(), categories = file.categories.len(), "seeding catalog");

    let categories = CategoryRepository::new(pool);
    let catalog = CatalogService::new(pool, None);
    let mut summary = SeedSummary::default();

    for entry in file.categories {
        if categories.get_by_name(entry.name.trim()).await?.is_some() {
            warn!(name = %entry.name, "category exists, skipping");
            summary.skipped += 1;
            continue;
        }

        let fields = CategoryFields::validated(&entry.name, &entry.description)
            .map_err(|e| CliError::Invalid(format!("category {}: {e}", entry.name)))?;
        let category = catalog.add_category(&fields).await?;
        summary.categories += 1;

        for product in entry.products {
            let fields = ProductFields {
                name: product.name,
                description: product.description,
                price: Money::parse(product.price)
                    .map_err(|e| CliError::Invalid(e.to_string()))?,
                stock: product.stock,
                category_id: category.id,
                image: None,
            };
            catalog.add_product(fields).await?;
            summary.products += 1;
        }
    }

    info!(
        categories = summary.categories,
        products = summary.products,
        skipped = summary.skipped,
        "seeding complete"
    );
    Ok(())
}

/// Parse the YAML and reject values that would fail half-way through.
fn parse(content: &str) -> Result<SeedFile, CliError> {
    let file: SeedFile =
        serde_yaml::from_str(content).map_err(|e| CliError::Invalid(e.to_string()))?;

    for category in &file.categories {
        CategoryFields::validated(&category.name, &category.description)
            .map_err(|e| CliError::Invalid(format!("category {}: {e}", category.name)))?;
        for product in &category.products {
            Money::parse(product.price)
                .map_err(|e| CliError::Invalid(format!("product {}: {e}", product.name)))?;
        }
    }
    Ok(file)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_catalog() {
        let file = parse(
            r#"
categories:
  - name: Keyboards
    description: Mechanical keyboards
    products:
      - name: Tenkeyless
        description: 87 keys
        price: "59.90"
        stock: 12
  - name: Mice
    description: Pointing devices
"#,
        )
        .unwrap();

        assert_eq!(file.categories.len(), 2);
        assert_eq!(file.categories[0].products[0].stock, 12);
        assert_eq!(
            file.categories[0].products[0].price,
            Decimal::new(5990, 2)
        );
        assert!(file.categories[1].products.is_empty());
    }

    #[test]
    fn test_parse_rejects_negative_price() {
        let result = parse(
            r#"
categories:
  - name: Keyboards
    description: Mechanical keyboards
    products:
      - name: Broken
        description: bad price
        price: "-1.00"
        stock: 1
"#,
        );
        assert!(matches!(result, Err(CliError::Invalid(_))));
    }

    #[test]
    fn test_parse_rejects_blank_category_name() {
        let result = parse("categories:\n  - name: \"  \"\n    description: x\n");
        assert!(matches!(result, Err(CliError::Invalid(_))));
    }

    #[test]
    fn test_empty_file_seeds_nothing() {
        let file = parse("categories: []\n").unwrap();
        assert!(file.categories.is_empty());
    }
}
