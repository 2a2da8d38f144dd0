//! Public storefront catalog, served from projections.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use storefront_catalog::{CategoryId, ProductId};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    /// Category slug.
    pub category: Option<String>,
}

pub async fn list_categories(Extension(services): Extension<Arc<AppServices>>) -> Response {
    Json(serde_json::json!({ "items": services.categories().list() })).into_response()
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ProductQuery>,
) -> Response {
    let category = query.category.as_deref().map(CategoryId::for_slug);
    Json(serde_json::json!({ "items": services.products().list_listed(category) })).into_response()
}

/// `:id` is a product id or a slug. Archived products are hidden.
pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let view = match id.parse() {
        Ok(agg) => services.products().get(&ProductId::new(agg)),
        Err(_) => services.products().find_by_slug(&id),
    };
    match view {
        Some(view) if view.is_listed() => Ok(Json(view).into_response()),
        _ => Err(ApiError::NotFound("product")),
    }
}
