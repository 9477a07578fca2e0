//! Product routes.

use std::str::FromStr;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use ventas_core::access::{ADMIN_ONLY, ANY_ROLE};
use ventas_core::catalog::{
    CatalogError, MAX_STOCK, ProductFields, ProductPatch, TOP_SELLERS_LIMIT, search_pattern,
};
use ventas_core::{CategoryId, Money, ProductId};

use super::{ApiJson, ApiPath, ApiQuery, guarded};
use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::models::product::{Product, ProductWithCategory};
use crate::services::CatalogService;
use crate::services::uploads::MultipartForm;
use crate::state::AppState;

/// Multipart field carrying the product image.
const IMAGE_FIELD: &str = "image";

pub fn routes(state: &AppState) -> Router<AppState> {
    let readers = Router::new()
        .route("/", get(list))
        .route("/search", get(search))
        .route("/top-selling", get(top_selling))
        .route("/search/{id}", get(show));
    let admin = Router::new()
        .route("/addProduct", post(add))
        .route("/updateProduct/{id}", put(update))
        .route("/deleteProduct/{id}", patch(set_status));

    guarded(readers, state, ANY_ROLE).merge(guarded(admin, state, ADMIN_ONLY))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: bool,
}

fn catalog(state: &AppState) -> CatalogService<'_> {
    CatalogService::new(state.pool(), state.config().default_category_id)
}

/// Parse an optional form field with `FromStr`.
fn parse_field<T>(form: &MultipartForm, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    form.text(name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| AppError::Validation(format!("invalid {name}: {e}")))
        })
        .transpose()
}

fn parse_price(form: &MultipartForm) -> Result<Option<Money>> {
    parse_field::<Decimal>(form, "price")?
        .map(|amount| Money::parse(amount).map_err(AppError::from))
        .transpose()
}

fn parse_stock(form: &MultipartForm) -> Result<Option<u32>> {
    match parse_field::<u32>(form, "stock")? {
        Some(stock) if stock > MAX_STOCK => Err(CatalogError::StockTooLarge(stock).into()),
        stock => Ok(stock),
    }
}

/// Read the product form into a patch, storing the image if one was sent.
async fn read_patch(state: &AppState, multipart: Multipart) -> Result<ProductPatch> {
    let uploads = state.uploads();
    let form = MultipartForm::read(multipart, IMAGE_FIELD, uploads.max_bytes()).await?;

    let mut patch = ProductPatch {
        name: form.text("name").map(str::to_owned),
        description: form.text("description").map(str::to_owned),
        price: parse_price(&form)?,
        stock: parse_stock(&form)?,
        category_id: parse_field::<CategoryId>(&form, "category")?,
        image: None,
    };
    if let Some(file) = &form.file {
        patch.image = Some(uploads.save(file).await?);
    }
    Ok(patch)
}

/// Every field except the image is required for a new product.
fn new_product_fields(patch: ProductPatch) -> Result<ProductFields> {
    let required = |name: &str| AppError::Validation(format!("{name} is required"));
    Ok(ProductFields {
        name: patch.name.ok_or_else(|| required("name"))?,
        description: patch.description.ok_or_else(|| required("description"))?,
        price: patch.price.ok_or_else(|| required("price"))?,
        stock: patch.stock.ok_or_else(|| required("stock"))?,
        category_id: patch.category_id.ok_or_else(|| required("category"))?,
        image: patch.image,
    })
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<ProductWithCategory>>> {
    Ok(Json(ProductRepository::new(state.pool()).list_expanded().await?))
}

async fn search(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<Vec<ProductWithCategory>>> {
    let pattern = search_pattern(query.query.as_deref())?;
    Ok(Json(
        ProductRepository::new(state.pool())
            .search_by_name(&pattern)
            .await?,
    ))
}

async fn top_selling(State(state): State<AppState>) -> Result<Json<Vec<ProductWithCategory>>> {
    Ok(Json(
        ProductRepository::new(state.pool())
            .top_sellers(TOP_SELLERS_LIMIT)
            .await?,
    ))
}

async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ProductWithCategory>> {
    ProductRepository::new(state.pool())
        .get_expanded(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("product not found".to_string()))
}

#[instrument(skip(state, multipart))]
async fn add(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Product>)> {
    let patch = read_patch(&state, multipart?).await?;
    let stored = patch.image.clone();

    let result = match new_product_fields(patch) {
        Ok(fields) => catalog(&state)
            .add_product(fields)
            .await
            .map_err(AppError::from),
        Err(e) => Err(e),
    };

    match result {
        Ok(product) => Ok((StatusCode::CREATED, Json(product))),
        Err(e) => {
            if let Some(stored) = stored {
                state.uploads().remove(&stored).await;
            }
            Err(e)
        }
    }
}

/// Partial update. Only the supplied fields change; the image changes only
/// when a new file is sent.
#[instrument(skip(state, multipart))]
async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Product>> {
    let patch = read_patch(&state, multipart?).await?;
    if patch.is_empty() {
        return Err(AppError::Validation("no fields to update".to_string()));
    }
    let stored = patch.image.clone();

    match catalog(&state).update_product(id, patch).await {
        Ok((product, replaced)) => {
            if let Some(replaced) = replaced {
                state.uploads().remove(&replaced).await;
            }
            Ok(Json(product))
        }
        Err(e) => {
            if let Some(stored) = stored {
                state.uploads().remove(&stored).await;
            }
            Err(e.into())
        }
    }
}

/// Set the active flag explicitly, independent of stock.
#[instrument(skip(state, request))]
async fn set_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> Result<Json<Product>> {
    Ok(Json(
        catalog(&state)
            .set_product_active(id, request.status)
            .await?,
    ))
}
