use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::Utc;

use storefront_core::UserId;
use storefront_infra::checkout::{load_cart, load_product, price_cart};
use storefront_infra::command_dispatcher::DispatchError;
use storefront_infra::streams;
use storefront_shop::{AddItem, Cart, CartCommand, CartId, ClearCart, RemoveItem, SetQuantity};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::ApiJson;
use crate::app::routes::common::parse_product_id;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:product_id", delete(remove_item).put(set_quantity))
}

fn make_cart(id: storefront_core::AggregateId) -> Cart {
    Cart::empty(CartId(id))
}

/// Cart priced against current product state.
fn cart_response(services: &AppServices, cart: &Cart) -> Result<Response, ApiError> {
    let priced = price_cart(services.dispatcher(), cart)?;
    Ok(Json(dto::cart_to_json(cart, &priced)).into_response())
}

fn run(services: &AppServices, user_id: UserId, command: CartCommand) -> Result<Response, ApiError> {
    let cart = services.execute(CartId::for_user(user_id).0, streams::CART, command, make_cart)?;
    cart_response(services, &cart)
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    let cart = load_cart(services.dispatcher(), user.user_id())?;
    cart_response(&services, &cart)
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(body): ApiJson<dto::AddCartItemRequest>,
) -> Result<Response, ApiError> {
    let product_id = parse_product_id(&body.product_id)?;
    let product = load_product(services.dispatcher(), product_id)?;
    if !product.exists() {
        return Err(ApiError::NotFound("product"));
    }
    if !product.can_be_sold() {
        return Err(DispatchError::InvariantViolation("product is no longer available".to_string()).into());
    }

    run(
        &services,
        user.user_id(),
        CartCommand::AddItem(AddItem {
            cart_id: CartId::for_user(user.user_id()),
            user_id: user.user_id(),
            product_id,
            quantity: body.quantity,
            occurred_at: Utc::now(),
        }),
    )
}

pub async fn set_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(product_id): Path<String>,
    ApiJson(body): ApiJson<dto::SetQuantityRequest>,
) -> Result<Response, ApiError> {
    let product_id = parse_product_id(&product_id)?;
    run(
        &services,
        user.user_id(),
        CartCommand::SetQuantity(SetQuantity {
            cart_id: CartId::for_user(user.user_id()),
            user_id: user.user_id(),
            product_id,
            quantity: body.quantity,
            occurred_at: Utc::now(),
        }),
    )
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(product_id): Path<String>,
) -> Result<Response, ApiError> {
    let product_id = parse_product_id(&product_id)?;
    run(
        &services,
        user.user_id(),
        CartCommand::RemoveItem(RemoveItem {
            cart_id: CartId::for_user(user.user_id()),
            user_id: user.user_id(),
            product_id,
            occurred_at: Utc::now(),
        }),
    )
}

pub async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    run(
        &services,
        user.user_id(),
        CartCommand::ClearCart(ClearCart {
            cart_id: CartId::for_user(user.user_id()),
            user_id: user.user_id(),
            occurred_at: Utc::now(),
        }),
    )
}
