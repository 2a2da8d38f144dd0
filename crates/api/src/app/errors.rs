use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use storefront_auth::AuthzError;
use storefront_infra::checkout::CheckoutError;
use storefront_infra::command_dispatcher::DispatchError;
use storefront_shop::DiscountRejection;

/// Every handler failure, rendered as `{"error": <code>, "message": <text>}`.
#[derive(Debug)]
pub enum ApiError {
    Dispatch(DispatchError),
    Checkout(CheckoutError),
    Forbidden(AuthzError),
    BadRequest { code: &'static str, message: String },
    NotFound(&'static str),
    InvalidBody(JsonRejection),
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code,
            message: message.into(),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(value: DispatchError) -> Self {
        ApiError::Dispatch(value)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(value: CheckoutError) -> Self {
        ApiError::Checkout(value)
    }
}

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        ApiError::Forbidden(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Dispatch(e) => dispatch_error_to_response(e),
            ApiError::Checkout(e) => checkout_error_to_response(e),
            ApiError::Forbidden(e) => json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
            ApiError::BadRequest { code, message } => json_error(StatusCode::BAD_REQUEST, code, message),
            ApiError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
            ApiError::InvalidBody(rejection) => json_error(rejection.status(), "invalid_body", rejection.body_text()),
        }
    }
}

pub fn dispatch_error_to_response(err: DispatchError) -> Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "concurrency_conflict", msg),
        DispatchError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "forbidden", "not the owner of this resource"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            tracing::error!(error = %msg, "stored event could not be decoded");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => {
            tracing::error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        DispatchError::Publish(msg) => {
            tracing::error!(error = %msg, "event publication failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "publish_error", msg)
        }
    }
}

pub fn rejection_to_response(rejection: &DiscountRejection) -> Response {
    tracing::debug!(reason = rejection.reason_code(), "discount rejected");
    let status = StatusCode::from_u16(rejection.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
    json_error(status, rejection.reason_code(), rejection.to_string())
}

pub fn checkout_error_to_response(err: CheckoutError) -> Response {
    match err {
        CheckoutError::EmptyCart => json_error(StatusCode::BAD_REQUEST, "empty_cart", "cart is empty"),
        CheckoutError::ShippingMethodUnavailable => json_error(
            StatusCode::BAD_REQUEST,
            "shipping_method_unavailable",
            "shipping method is not available",
        ),
        CheckoutError::Discount(rejection) => rejection_to_response(&rejection),
        CheckoutError::RedemptionRejected(msg) => json_error(StatusCode::CONFLICT, "discount_unavailable", msg),
        CheckoutError::Dispatch(e) => dispatch_error_to_response(e),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
