use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::PaginationParams;
use crate::auth::AuthUser;
use crate::entities::review;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::reviews::{AdminReviewView, ReviewInput, ReviewView};
use crate::{ApiResponse, ApiResult, PaginatedResponse};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReviewModerationQuery {
    /// Only reviews awaiting approval
    #[serde(default)]
    pub pending: bool,
}

// ==================== Storefront ====================

/// Approved reviews for a product, newest first
#[utoipa::path(
    get,
    path = "/api/v1/products/{slug}/reviews",
    params(
        ("slug" = String, Path, description = "Product slug"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "Review list", body = crate::ApiResponse<crate::PaginatedResponse<ReviewView>>),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn list_product_reviews(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<ReviewView>> {
    let (page, per_page) = pagination.clamped(state.config.api_max_page_size);
    let (reviews, total) = state
        .services
        .reviews
        .list_for_product(&slug, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        reviews, total, page, per_page,
    ))))
}

/// Submit a review for a product
///
/// One review per customer per product; it stays hidden until approved.
#[utoipa::path(
    post,
    path = "/api/v1/products/{slug}/reviews",
    params(("slug" = String, Path, description = "Product slug")),
    request_body = ReviewInput,
    responses(
        (status = 201, description = "Review submitted, awaiting moderation", body = crate::ApiResponse<review::Model>),
        (status = 400, description = "Rating out of range", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already reviewed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn submit_review(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    user: AuthUser,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<ApiResponse<review::Model>>), ServiceError> {
    let saved = state
        .services
        .reviews
        .submit(user.user_id, &slug, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(saved))))
}

// ==================== Admin ====================

/// Moderation queue, optionally narrowed to pending reviews
#[utoipa::path(
    get,
    path = "/api/v1/admin/reviews",
    params(PaginationParams, ReviewModerationQuery),
    responses(
        (status = 200, description = "Review list with product and reviewer names", body = crate::ApiResponse<crate::PaginatedResponse<AdminReviewView>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(moderation): Query<ReviewModerationQuery>,
) -> ApiResult<PaginatedResponse<AdminReviewView>> {
    let (page, per_page) = pagination.clamped(state.config.api_max_page_size);
    let (reviews, total) = state
        .services
        .reviews
        .list_admin(moderation.pending, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        reviews, total, page, per_page,
    ))))
}

/// Publish a review. Approving an already-approved review is a no-op.
#[utoipa::path(
    put,
    path = "/api/v1/admin/reviews/{id}/approve",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review approved", body = crate::ApiResponse<review::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn approve_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<review::Model> {
    let review = state.services.reviews.approve(id).await?;
    Ok(Json(ApiResponse::success(review)))
}

/// Remove a review entirely
#[utoipa::path(
    delete,
    path = "/api/v1/admin/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.reviews.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Admin moderation routes, nested under `/admin/reviews`
pub fn admin_review_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reviews))
        .route("/:id", delete(delete_review))
        .route("/:id/approve", put(approve_review))
}
