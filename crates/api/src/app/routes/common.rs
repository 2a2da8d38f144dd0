use storefront_catalog::{Category, CategoryId, ProductId};
use storefront_core::AggregateId;
use storefront_shop::OrderStatus;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn parse_id(raw: &str, what: &'static str) -> Result<AggregateId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("invalid_id", format!("invalid {what} id")))
}

/// `?status=` filter on order listings. Blank means no filter.
pub fn parse_order_status(raw: Option<&str>) -> Result<Option<OrderStatus>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    serde_json::from_value(serde_json::Value::String(raw.to_ascii_lowercase()))
        .map(Some)
        .map_err(|_| ApiError::bad_request("invalid_status", format!("unknown order status '{raw}'")))
}

pub fn parse_product_id(raw: &str) -> Result<ProductId, ApiError> {
    parse_id(raw, "product").map(ProductId::new)
}

/// Resolve an optional category slug to an existing category.
pub fn existing_category(services: &AppServices, slug: Option<&str>) -> Result<Option<CategoryId>, ApiError> {
    let Some(slug) = slug.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let id = CategoryId::for_slug(slug);
    let category = services.load(id.0, |agg| Category::empty(CategoryId::new(agg)))?;
    if !category.exists() {
        return Err(ApiError::bad_request("unknown_category", format!("no category with slug '{slug}'")));
    }
    Ok(Some(id))
}
