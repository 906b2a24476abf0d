use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common::PaginationParams;
use crate::auth::AuthUser;
use crate::entities::order::{self, OrderStatus};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::orders::{AdminOrderFilter, DashboardSummary, OrderDetail};
use crate::{ApiResponse, ApiResult, PaginatedResponse};

#[derive(Debug, Deserialize, IntoParams)]
pub struct TrackOrderQuery {
    /// Order number from the confirmation page, e.g. `HH-7K2M9Q`
    pub order_number: String,
    /// Email used at checkout
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ExportQuery {
    /// Include orders placed at or after this instant (RFC 3339)
    pub from: Option<DateTime<Utc>>,
    /// Include orders placed at or before this instant (RFC 3339)
    pub to: Option<DateTime<Utc>>,
}

// ==================== Storefront ====================

/// Guest order tracking by order number and checkout email
#[utoipa::path(
    get,
    path = "/api/v1/orders/track",
    params(TrackOrderQuery),
    responses(
        (status = 200, description = "Order with lines", body = crate::ApiResponse<OrderDetail>),
        (status = 404, description = "No matching order", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn track_order(
    State(state): State<AppState>,
    Query(query): Query<TrackOrderQuery>,
) -> ApiResult<OrderDetail> {
    let detail = state
        .services
        .orders
        .track_order(&query.order_number, &query.email)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

// ==================== Customer ====================

/// The signed-in customer's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Order list", body = crate::ApiResponse<crate::PaginatedResponse<order::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<order::Model>> {
    let (page, per_page) = pagination.clamped(state.config.api_max_page_size);
    let (orders, total) = state
        .services
        .orders
        .list_for_customer(user.user_id, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        orders, total, page, per_page,
    ))))
}

/// One of the signed-in customer's orders, with lines
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with lines", body = crate::ApiResponse<OrderDetail>),
        (status = 404, description = "Not found or not yours", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_my_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let detail = state
        .services
        .orders
        .get_for_customer(id, user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

// ==================== Admin ====================

/// List orders with status, payment and date filters
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    params(PaginationParams, AdminOrderFilter),
    responses(
        (status = 200, description = "Order list", body = crate::ApiResponse<crate::PaginatedResponse<order::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<AdminOrderFilter>,
) -> ApiResult<PaginatedResponse<order::Model>> {
    let (page, per_page) = pagination.clamped(state.config.api_max_page_size);
    let (orders, total) = state
        .services
        .orders
        .list_orders(filter, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        orders, total, page, per_page,
    ))))
}

/// Fetch any order by id
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with lines", body = crate::ApiResponse<OrderDetail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let detail = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Move an order along the fulfilment flow
///
/// Cancelling restores stock and marks paid orders refunded; delivering a
/// COD order settles its payment. Repeating the current status is a no-op.
#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Order updated", body = crate::ApiResponse<order::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<order::Model> {
    let order = state
        .services
        .orders
        .update_status(id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Export orders in a date window as CSV, one row per line item
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders/export",
    params(ExportQuery),
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv", body = String)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn export_orders(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let csv = state.services.csv.export_orders(query.from, query.to).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"orders.csv\"",
            ),
        ],
        csv,
    ))
}

/// Back-office dashboard: status counts, revenue, low stock, latest orders
#[utoipa::path(
    get,
    path = "/api/v1/admin/dashboard",
    responses(
        (status = 200, description = "Dashboard summary", body = crate::ApiResponse<DashboardSummary>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<DashboardSummary> {
    let summary = state.services.orders.dashboard().await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Admin order routes, nested under `/admin/orders`
pub fn admin_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/export", get(export_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_order_status))
}
