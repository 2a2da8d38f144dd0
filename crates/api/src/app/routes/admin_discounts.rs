use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use storefront_infra::checkout::load_discount_code;
use storefront_infra::streams;
use storefront_shop::{
    ActivateDiscountCode, CreateDiscountCode, DeactivateDiscountCode, DiscountCode, DiscountCodeCommand, DiscountCodeId,
    DiscountRules, UpdateDiscountRules,
};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;
use crate::authz::{self, DISCOUNTS_MANAGE};
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/discounts", get(list_codes).post(create_code))
        .route("/discounts/:code", get(get_code).put(update_rules))
        .route("/discounts/:code/activate", post(activate_code))
        .route("/discounts/:code/deactivate", post(deactivate_code))
}

fn make_code(id: storefront_core::AggregateId) -> DiscountCode {
    DiscountCode::empty(DiscountCodeId(id))
}

fn run(services: &AppServices, code: &str, command: DiscountCodeCommand) -> Result<DiscountCode, ApiError> {
    Ok(services.execute(DiscountCodeId::for_code(code).0, streams::DISCOUNT_CODE, command, make_code)?)
}

pub async fn list_codes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    authz::require(&user, DISCOUNTS_MANAGE)?;
    Ok(Json(serde_json::json!({ "items": services.discounts().list() })).into_response())
}

pub async fn create_code(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(body): ApiJson<dto::CreateDiscountRequest>,
) -> Result<Response, ApiError> {
    authz::require(&user, DISCOUNTS_MANAGE)?;

    let code = run(
        &services,
        &body.code,
        DiscountCodeCommand::Create(CreateDiscountCode {
            code_id: DiscountCodeId::for_code(&body.code),
            code: body.code.clone(),
            rules: body.rules,
            is_active: body.is_active,
            occurred_at: Utc::now(),
        }),
    )?;
    tracing::info!(code = code.code(), "discount code created");

    Ok((StatusCode::CREATED, Json(dto::discount_to_json(&code))).into_response())
}

pub async fn get_code(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&user, DISCOUNTS_MANAGE)?;

    let discount = load_discount_code(services.dispatcher(), &code)?;
    if !discount.exists() {
        return Err(ApiError::NotFound("discount code"));
    }
    Ok(Json(dto::discount_to_json(&discount)).into_response())
}

pub async fn update_rules(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
    Json(rules): Json<DiscountRules>,
) -> Result<Response, ApiError> {
    authz::require(&user, DISCOUNTS_MANAGE)?;

    let discount = run(
        &services,
        &code,
        DiscountCodeCommand::UpdateRules(UpdateDiscountRules {
            code_id: DiscountCodeId::for_code(&code),
            rules,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(Json(dto::discount_to_json(&discount)).into_response())
}

pub async fn activate_code(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&user, DISCOUNTS_MANAGE)?;

    let discount = run(
        &services,
        &code,
        DiscountCodeCommand::Activate(ActivateDiscountCode {
            code_id: DiscountCodeId::for_code(&code),
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(Json(dto::discount_to_json(&discount)).into_response())
}

pub async fn deactivate_code(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&user, DISCOUNTS_MANAGE)?;

    let discount = run(
        &services,
        &code,
        DiscountCodeCommand::Deactivate(DeactivateDiscountCode {
            code_id: DiscountCodeId::for_code(&code),
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(Json(dto::discount_to_json(&discount)).into_response())
}
