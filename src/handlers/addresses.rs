use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::address;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::customers::AddressInput;
use crate::{ApiResponse, ApiResult};

/// The signed-in customer's saved addresses, default first
#[utoipa::path(
    get,
    path = "/api/v1/addresses",
    responses(
        (status = 200, description = "Address list", body = crate::ApiResponse<Vec<address::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<address::Model>> {
    let addresses = state
        .services
        .customers
        .list_addresses(user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(addresses)))
}

/// Save a new address
///
/// The first saved address becomes the default; `is_default: true` demotes
/// the previous default.
#[utoipa::path(
    post,
    path = "/api/v1/addresses",
    request_body = AddressInput,
    responses(
        (status = 201, description = "Address saved", body = crate::ApiResponse<address::Model>),
        (status = 400, description = "Missing required fields", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn create_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, Json<ApiResponse<address::Model>>), ServiceError> {
    let saved = state
        .services
        .customers
        .create_address(user.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(saved))))
}

/// Update one of the customer's addresses
#[utoipa::path(
    put,
    path = "/api/v1/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address ID")),
    request_body = AddressInput,
    responses(
        (status = 200, description = "Address updated", body = crate::ApiResponse<address::Model>),
        (status = 404, description = "Not found or not yours", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn update_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<AddressInput>,
) -> ApiResult<address::Model> {
    let saved = state
        .services
        .customers
        .update_address(user.user_id, id, input)
        .await?;
    Ok(Json(ApiResponse::success(saved)))
}

/// Delete one of the customer's addresses
#[utoipa::path(
    delete,
    path = "/api/v1/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address ID")),
    responses(
        (status = 204, description = "Address deleted"),
        (status = 404, description = "Not found or not yours", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .customers
        .delete_address(user.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Address-book routes, nested under `/addresses`
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_addresses).post(create_address))
        .route("/:id", put(update_address).delete(delete_address))
}
