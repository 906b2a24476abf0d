use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::PaginationParams;
use crate::entities::coupon;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::coupons::{CouponQuote, CreateCouponInput, UpdateCouponInput};
use crate::{ApiResponse, ApiResult, PaginatedResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateCouponRequest {
    pub code: String,
    /// Cart subtotal the discount is judged against
    pub subtotal: Decimal,
}

/// Quote a coupon against a subtotal without applying it
#[utoipa::path(
    post,
    path = "/api/v1/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Coupon quote", body = crate::ApiResponse<CouponQuote>),
        (status = 404, description = "Unknown code", body = crate::errors::ErrorResponse),
        (status = 422, description = "Coupon not applicable", body = crate::errors::ErrorResponse)
    ),
    tag = "Coupons"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(request): Json<ValidateCouponRequest>,
) -> ApiResult<CouponQuote> {
    let quote = state
        .services
        .coupons
        .validate_for_subtotal(&request.code, request.subtotal)
        .await?;
    Ok(Json(ApiResponse::success(quote)))
}

// ==================== Admin ====================

/// List coupons, newest first
#[utoipa::path(
    get,
    path = "/api/v1/admin/coupons",
    params(PaginationParams),
    responses(
        (status = 200, description = "Coupon list", body = crate::ApiResponse<crate::PaginatedResponse<coupon::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<coupon::Model>> {
    let (page, per_page) = pagination.clamped(state.config.api_max_page_size);
    let (coupons, total) = state.services.coupons.list_coupons(page, per_page).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        coupons, total, page, per_page,
    ))))
}

/// Create a coupon
#[utoipa::path(
    post,
    path = "/api/v1/admin/coupons",
    request_body = CreateCouponInput,
    responses(
        (status = 201, description = "Coupon created", body = crate::ApiResponse<coupon::Model>),
        (status = 409, description = "Duplicate code", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    Json(input): Json<CreateCouponInput>,
) -> Result<(StatusCode, Json<ApiResponse<coupon::Model>>), ServiceError> {
    let coupon = state.services.coupons.create_coupon(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(coupon))))
}

/// Fetch a coupon by id
#[utoipa::path(
    get,
    path = "/api/v1/admin/coupons/{id}",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    responses(
        (status = 200, description = "Coupon", body = crate::ApiResponse<coupon::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<coupon::Model> {
    let coupon = state.services.coupons.get_coupon(id).await?;
    Ok(Json(ApiResponse::success(coupon)))
}

/// Update a coupon; the code itself is immutable
#[utoipa::path(
    put,
    path = "/api/v1/admin/coupons/{id}",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    request_body = UpdateCouponInput,
    responses(
        (status = 200, description = "Coupon updated", body = crate::ApiResponse<coupon::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCouponInput>,
) -> ApiResult<coupon::Model> {
    let coupon = state.services.coupons.update_coupon(id, input).await?;
    Ok(Json(ApiResponse::success(coupon)))
}

/// Delete a coupon; orders that already used it keep their discount
#[utoipa::path(
    delete,
    path = "/api/v1/admin/coupons/{id}",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    responses(
        (status = 204, description = "Coupon deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.coupons.delete_coupon(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Admin coupon routes, nested under `/admin/coupons`
pub fn admin_coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_coupons).post(create_coupon))
        .route(
            "/:id",
            get(get_coupon)
                .put(update_coupon)
                .delete(delete_coupon),
        )
}
