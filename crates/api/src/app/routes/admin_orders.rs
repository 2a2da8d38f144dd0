use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use storefront_infra::streams;
use storefront_shop::{
    ChangeOrderStatus, ChangePaymentStatus, Order, OrderCommand, OrderId, PaymentId, RecordPayment,
};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::ApiJson;
use crate::app::routes::common::{parse_id, parse_order_status};
use crate::app::routes::orders::OrderListQuery;
use crate::app::services::AppServices;
use crate::authz::{self, ORDERS_MANAGE};
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/:id/status", post(change_status))
        .route("/orders/:id/payments", post(record_payment))
        .route("/orders/:id/payments/:payment_id/status", post(change_payment_status))
}

fn make_order(id: storefront_core::AggregateId) -> Order {
    Order::empty(OrderId::new(id))
}

pub async fn list_all_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<OrderListQuery>,
) -> Result<Response, ApiError> {
    authz::require(&user, ORDERS_MANAGE)?;
    let status = parse_order_status(query.status.as_deref())?;
    Ok(Json(serde_json::json!({ "items": services.orders().search(None, status) })).into_response())
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::ChangeOrderStatusRequest>,
) -> Result<Response, ApiError> {
    authz::require(&user, ORDERS_MANAGE)?;

    let order_id = OrderId::new(parse_id(&id, "order")?);
    let order = services.execute(
        order_id.0,
        streams::ORDER,
        OrderCommand::ChangeStatus(ChangeOrderStatus {
            order_id,
            status: body.status,
            occurred_at: Utc::now(),
        }),
        make_order,
    )?;
    tracing::info!(order_id = %order_id.0, status = order.status().as_str(), "order status changed");

    Ok(Json(dto::order_to_json(&order)).into_response())
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::RecordPaymentRequest>,
) -> Result<Response, ApiError> {
    authz::require(&user, ORDERS_MANAGE)?;

    let order_id = OrderId::new(parse_id(&id, "order")?);
    let payment_id = PaymentId::generate();
    let order = services.execute(
        order_id.0,
        streams::ORDER,
        OrderCommand::RecordPayment(RecordPayment {
            order_id,
            payment_id,
            amount: body.amount,
            method: body.method,
            transaction_id: body.transaction_id,
            occurred_at: Utc::now(),
        }),
        make_order,
    )?;
    tracing::info!(order_id = %order_id.0, payment_id = %payment_id, amount = %body.amount, "payment recorded");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "payment_id": payment_id.to_string(),
            "order": dto::order_to_json(&order),
        })),
    )
        .into_response())
}

pub async fn change_payment_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path((id, payment_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<dto::ChangePaymentStatusRequest>,
) -> Result<Response, ApiError> {
    authz::require(&user, ORDERS_MANAGE)?;

    let order_id = OrderId::new(parse_id(&id, "order")?);
    let payment_id = PaymentId(parse_id(&payment_id, "payment")?);
    let order = services.execute(
        order_id.0,
        streams::ORDER,
        OrderCommand::ChangePaymentStatus(ChangePaymentStatus {
            order_id,
            payment_id,
            status: body.status,
            occurred_at: Utc::now(),
        }),
        make_order,
    )?;
    tracing::info!(order_id = %order_id.0, payment_id = %payment_id, status = body.status.as_str(), "payment status changed");

    Ok(Json(dto::order_to_json(&order)).into_response())
}
