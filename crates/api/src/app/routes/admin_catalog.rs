use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{post, put},
};
use chrono::Utc;

use storefront_catalog::{
    AdjustStock, ArchiveProduct, Category, CategoryCommand, CategoryId, CreateCategory, CreateProduct, Pricing, Product,
    ProductCommand, ProductId, UpdateCategory, UpdatePricing,
};
use storefront_infra::streams;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::ApiJson;
use crate::app::routes::common::{existing_category, parse_id, parse_product_id};
use crate::app::services::AppServices;
use crate::authz::{self, CATALOG_MANAGE};
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/categories", post(create_category))
        .route("/categories/:id", put(update_category))
        .route("/products", post(create_product))
        .route("/products/:id/pricing", post(update_pricing))
        .route("/products/:id/stock", post(adjust_stock))
        .route("/products/:id/archive", post(archive_product))
}

fn make_category(id: storefront_core::AggregateId) -> Category {
    Category::empty(CategoryId::new(id))
}

fn make_product(id: storefront_core::AggregateId) -> Product {
    Product::empty(ProductId::new(id))
}

fn product_json(product: &Product) -> serde_json::Value {
    serde_json::json!({
        "id": product.id_typed().0.to_string(),
        "slug": product.slug(),
        "title": product.title(),
        "price": product.pricing().price,
        "sale_price": product.pricing().sale_price,
        "effective_price": product.pricing().effective_price(),
        "stock": product.stock(),
        "status": product.status(),
    })
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(body): ApiJson<dto::CreateCategoryRequest>,
) -> Result<Response, ApiError> {
    authz::require(&user, CATALOG_MANAGE)?;

    let category_id = CategoryId::for_slug(&body.slug);
    let parent = existing_category(&services, body.parent.as_deref())?;
    let category = services.execute(
        category_id.0,
        streams::CATEGORY,
        CategoryCommand::CreateCategory(CreateCategory {
            category_id,
            name: body.name,
            slug: body.slug,
            parent,
            description: body.description,
            occurred_at: Utc::now(),
        }),
        make_category,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": category_id.0.to_string(),
            "slug": category.slug(),
            "name": category.name(),
        })),
    )
        .into_response())
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdateCategoryRequest>,
) -> Result<Response, ApiError> {
    authz::require(&user, CATALOG_MANAGE)?;

    let category_id = CategoryId::new(parse_id(&id, "category")?);
    let parent = existing_category(&services, body.parent.as_deref())?;
    let category = services.execute(
        category_id.0,
        streams::CATEGORY,
        CategoryCommand::UpdateCategory(UpdateCategory {
            category_id,
            name: body.name,
            parent,
            description: body.description,
            occurred_at: Utc::now(),
        }),
        make_category,
    )?;

    Ok(Json(serde_json::json!({
        "id": category_id.0.to_string(),
        "slug": category.slug(),
        "name": category.name(),
    }))
    .into_response())
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(body): ApiJson<dto::CreateProductRequest>,
) -> Result<Response, ApiError> {
    authz::require(&user, CATALOG_MANAGE)?;

    let product_id = ProductId::for_slug(&body.slug);
    let category = existing_category(&services, body.category.as_deref())?;
    let product = services.execute(
        product_id.0,
        streams::PRODUCT,
        ProductCommand::CreateProduct(CreateProduct {
            product_id,
            title: body.title,
            slug: body.slug,
            summary: body.summary,
            category,
            pricing: Pricing {
                price: body.price,
                sale_price: body.sale_price,
            },
            stock: body.stock,
            product_type: body.product_type,
            occurred_at: Utc::now(),
        }),
        make_product,
    )?;

    Ok((StatusCode::CREATED, Json(product_json(&product))).into_response())
}

pub async fn update_pricing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdatePricingRequest>,
) -> Result<Response, ApiError> {
    authz::require(&user, CATALOG_MANAGE)?;

    let product_id = parse_product_id(&id)?;
    let product = services.execute(
        product_id.0,
        streams::PRODUCT,
        ProductCommand::UpdatePricing(UpdatePricing {
            product_id,
            pricing: body.pricing(),
            occurred_at: Utc::now(),
        }),
        make_product,
    )?;

    Ok(Json(product_json(&product)).into_response())
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::AdjustStockRequest>,
) -> Result<Response, ApiError> {
    authz::require(&user, CATALOG_MANAGE)?;

    let product_id = parse_product_id(&id)?;
    let product = services.execute(
        product_id.0,
        streams::PRODUCT,
        ProductCommand::AdjustStock(AdjustStock {
            product_id,
            delta: body.delta,
            occurred_at: Utc::now(),
        }),
        make_product,
    )?;

    Ok(Json(product_json(&product)).into_response())
}

pub async fn archive_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&user, CATALOG_MANAGE)?;

    let product_id = parse_product_id(&id)?;
    let product = services.execute(
        product_id.0,
        streams::PRODUCT,
        ProductCommand::ArchiveProduct(ArchiveProduct {
            product_id,
            occurred_at: Utc::now(),
        }),
        make_product,
    )?;

    Ok(Json(product_json(&product)).into_response())
}
