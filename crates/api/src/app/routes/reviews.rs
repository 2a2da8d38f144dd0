//! Product reviews: public listing of approved reviews, submission by
//! signed-in users, moderation by catalog staff.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::Utc;
use serde::Deserialize;

use storefront_catalog::{EditReview, ModerateReview, Product, ProductId, Review, ReviewCommand, ReviewId, SubmitReview};
use storefront_core::AggregateId;
use storefront_infra::projections::{ReviewOrdering, ReviewQuery};
use storefront_infra::streams;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::ApiJson;
use crate::app::routes::common::{parse_id, parse_product_id};
use crate::app::services::AppServices;
use crate::authz::{self, CATALOG_MANAGE};
use crate::context::CurrentUser;

/// Mounted under `/catalog`.
pub fn public_router() -> Router {
    Router::new().route("/reviews", get(list_reviews))
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(submit_review))
        .route("/:id", put(edit_review))
}

pub fn admin_router() -> Router {
    Router::new()
        .route("/reviews", get(list_all_reviews))
        .route("/reviews/:id/approve", post(approve_review))
        .route("/reviews/:id/hide", post(hide_review))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewListQuery {
    pub product: Option<String>,
    pub rating: Option<u8>,
    /// `created_at`, `-created_at` (default), `rating` or `-rating`.
    pub ordering: Option<String>,
}

impl ReviewListQuery {
    fn into_query(self, include_unapproved: bool) -> Result<ReviewQuery, ApiError> {
        let product = self.product.as_deref().map(parse_product_id).transpose()?;
        let ordering = match self.ordering.as_deref() {
            None | Some("") => ReviewOrdering::default(),
            Some(raw) => ReviewOrdering::parse(raw)
                .ok_or_else(|| ApiError::bad_request("invalid_ordering", format!("cannot order reviews by '{raw}'")))?,
        };
        Ok(ReviewQuery {
            product,
            rating: self.rating,
            include_unapproved,
            ordering,
        })
    }
}

fn make_review(id: AggregateId) -> Review {
    Review::empty(ReviewId::new(id))
}

pub async fn list_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Response, ApiError> {
    let query = query.into_query(false)?;
    Ok(Json(serde_json::json!({ "items": services.reviews().search(&query) })).into_response())
}

pub async fn list_all_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Response, ApiError> {
    authz::require(&user, CATALOG_MANAGE)?;
    let query = query.into_query(true)?;
    Ok(Json(serde_json::json!({ "items": services.reviews().search(&query) })).into_response())
}

pub async fn submit_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(body): ApiJson<dto::SubmitReviewRequest>,
) -> Result<Response, ApiError> {
    let product_id = parse_product_id(&body.product_id)?;
    let product = services.load(product_id.0, |agg| Product::empty(ProductId::new(agg)))?;
    if !product.can_be_sold() {
        return Err(ApiError::bad_request("unknown_product", "product is not available"));
    }

    let review_id = ReviewId::for_author(product_id, user.user_id());
    let review = services.execute(
        review_id.0,
        streams::REVIEW,
        ReviewCommand::Submit(SubmitReview {
            review_id,
            product_id,
            author: user.user_id(),
            rating: body.rating,
            title: body.title,
            content: body.content,
            occurred_at: Utc::now(),
        }),
        make_review,
    )?;
    tracing::info!(review_id = %review_id, product_id = %product_id.0, rating = review.rating(), "review submitted");

    Ok((StatusCode::CREATED, Json(dto::review_to_json(&review))).into_response())
}

pub async fn edit_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::EditReviewRequest>,
) -> Result<Response, ApiError> {
    let review_id = ReviewId::new(parse_id(&id, "review")?);
    let review = services.execute(
        review_id.0,
        streams::REVIEW,
        ReviewCommand::Edit(EditReview {
            review_id,
            author: user.user_id(),
            rating: body.rating,
            title: body.title,
            content: body.content,
            occurred_at: Utc::now(),
        }),
        make_review,
    )?;
    Ok(Json(dto::review_to_json(&review)).into_response())
}

pub async fn approve_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    moderate(&services, &user, &id, true)
}

pub async fn hide_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    moderate(&services, &user, &id, false)
}

fn moderate(services: &AppServices, user: &CurrentUser, id: &str, approved: bool) -> Result<Response, ApiError> {
    authz::require(user, CATALOG_MANAGE)?;
    let review_id = ReviewId::new(parse_id(id, "review")?);
    let review = services.execute(
        review_id.0,
        streams::REVIEW,
        ReviewCommand::Moderate(ModerateReview {
            review_id,
            approved,
            occurred_at: Utc::now(),
        }),
        make_review,
    )?;
    tracing::info!(review_id = %review_id, approved, "review moderated");
    Ok(Json(dto::review_to_json(&review)).into_response())
}
