use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;

use storefront_infra::checkout::{CheckoutRequest, place_order};
use storefront_shop::{Order, OrderId, ShippingMethodId};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::ApiJson;
use crate::app::routes::common::{parse_id, parse_order_status};
use crate::app::services::AppServices;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", get(get_order))
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(body): ApiJson<dto::PlaceOrderRequest>,
) -> Result<Response, ApiError> {
    let shipping_method = body
        .shipping_method
        .as_deref()
        .map(|raw| parse_id(raw, "shipping method").map(ShippingMethodId::new))
        .transpose()?;
    let order = place_order(
        services.dispatcher(),
        services.flat_shipping(),
        CheckoutRequest {
            user_id: user.user_id(),
            email: user.email().map(str::to_string),
            shipping_address: body.shipping_address,
            notes: body.notes,
            discount_code: body.discount_code,
            shipping_method,
        },
        Utc::now(),
    )?;

    Ok((StatusCode::CREATED, Json(dto::order_to_json(&order))).into_response())
}

/// The caller's orders, newest first (eventually consistent).
pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<OrderListQuery>,
) -> Result<Response, ApiError> {
    let status = parse_order_status(query.status.as_deref())?;
    let items = services.orders().search(Some(user.user_id()), status);
    Ok(Json(serde_json::json!({ "items": items })).into_response())
}

/// Other users' orders are reported as missing.
pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let order_id = OrderId::new(parse_id(&id, "order")?);
    let order = services.load(order_id.0, |agg| Order::empty(OrderId::new(agg)))?;
    if !order.exists() || order.user_id() != Some(user.user_id()) {
        return Err(ApiError::NotFound("order"));
    }
    Ok(Json(dto::order_to_json(&order)).into_response())
}
