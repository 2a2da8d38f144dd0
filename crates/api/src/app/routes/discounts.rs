use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;

use storefront_infra::checkout::evaluate_for_user;
use storefront_shop::Customer;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new().route("/validate", post(validate_code))
}

/// Evaluate a code against the caller's current cart. Nothing is recorded.
pub async fn validate_code(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(body): ApiJson<dto::ValidateDiscountRequest>,
) -> Result<Response, ApiError> {
    let customer = Customer {
        user_id: user.user_id(),
        email: user.email().map(str::to_string),
    };
    let outcome = evaluate_for_user(services.dispatcher(), &body.code, &customer, Utc::now())?;
    Ok(Json(outcome).into_response())
}
