//! Shipping methods: public listing of active methods, admin upkeep.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::Utc;

use storefront_core::AggregateId;
use storefront_infra::streams;
use storefront_shop::{
    CreateShippingMethod, SetShippingMethodActive, ShippingMethod, ShippingMethodCommand, ShippingMethodId,
    UpdateShippingMethod,
};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::ApiJson;
use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::authz::{self, ORDERS_MANAGE};
use crate::context::CurrentUser;

pub fn public_router() -> Router {
    Router::new().route("/", get(list_active))
}

pub fn admin_router() -> Router {
    Router::new()
        .route("/shipping-methods", get(list_all).post(create_method))
        .route("/shipping-methods/:id", put(update_method))
        .route("/shipping-methods/:id/activate", post(activate))
        .route("/shipping-methods/:id/deactivate", post(deactivate))
}

fn make_method(id: AggregateId) -> ShippingMethod {
    ShippingMethod::empty(ShippingMethodId::new(id))
}

fn method_json(method: &ShippingMethod) -> serde_json::Value {
    serde_json::json!({
        "id": method.id_typed().to_string(),
        "name": method.name(),
        "description": method.description(),
        "price": method.price(),
        "is_active": method.is_active(),
    })
}

/// Active methods, cheapest first.
pub async fn list_active(Extension(services): Extension<Arc<AppServices>>) -> Response {
    Json(serde_json::json!({ "items": services.shipping_methods().list_active() })).into_response()
}

pub async fn list_all(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    authz::require(&user, ORDERS_MANAGE)?;
    Ok(Json(serde_json::json!({ "items": services.shipping_methods().list() })).into_response())
}

pub async fn create_method(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(body): ApiJson<dto::ShippingMethodRequest>,
) -> Result<Response, ApiError> {
    authz::require(&user, ORDERS_MANAGE)?;

    let method_id = ShippingMethodId::generate();
    let method = services.execute(
        method_id.0,
        streams::SHIPPING_METHOD,
        ShippingMethodCommand::Create(CreateShippingMethod {
            method_id,
            name: body.name,
            description: body.description,
            price: body.price,
            is_active: body.is_active,
            occurred_at: Utc::now(),
        }),
        make_method,
    )?;
    tracing::info!(method_id = %method_id, name = method.name(), "shipping method created");

    Ok((StatusCode::CREATED, Json(method_json(&method))).into_response())
}

pub async fn update_method(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::ShippingMethodRequest>,
) -> Result<Response, ApiError> {
    authz::require(&user, ORDERS_MANAGE)?;

    let method_id = ShippingMethodId::new(parse_id(&id, "shipping method")?);
    let mut method = services.execute(
        method_id.0,
        streams::SHIPPING_METHOD,
        ShippingMethodCommand::Update(UpdateShippingMethod {
            method_id,
            name: body.name,
            description: body.description,
            price: body.price,
            occurred_at: Utc::now(),
        }),
        make_method,
    )?;
    if method.is_active() != body.is_active {
        method = set_active(&services, method_id, body.is_active)?;
    }

    Ok(Json(method_json(&method)).into_response())
}

pub async fn activate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&user, ORDERS_MANAGE)?;
    let method = set_active(&services, ShippingMethodId::new(parse_id(&id, "shipping method")?), true)?;
    Ok(Json(method_json(&method)).into_response())
}

pub async fn deactivate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&user, ORDERS_MANAGE)?;
    let method = set_active(&services, ShippingMethodId::new(parse_id(&id, "shipping method")?), false)?;
    Ok(Json(method_json(&method)).into_response())
}

fn set_active(services: &AppServices, method_id: ShippingMethodId, is_active: bool) -> Result<ShippingMethod, ApiError> {
    let method = services.execute(
        method_id.0,
        streams::SHIPPING_METHOD,
        ShippingMethodCommand::SetActive(SetShippingMethodActive {
            method_id,
            is_active,
            occurred_at: Utc::now(),
        }),
        make_method,
    )?;
    tracing::info!(method_id = %method_id, is_active, "shipping method availability changed");
    Ok(method)
}
