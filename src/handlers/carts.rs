use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::handlers::AppState;
use crate::services::cart::{AddItemInput, CartSession, CartView, UpdateItemInput};
use crate::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyCouponRequest {
    pub code: String,
}

/// Fetch the caller's active cart, creating one when none exists
#[utoipa::path(
    post,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Active cart", body = crate::ApiResponse<CartView>)
    ),
    tag = "Cart"
)]
pub async fn create_cart(
    State(state): State<AppState>,
    session: CartSession,
) -> ApiResult<CartView> {
    let view = state.services.cart.get_or_create_cart(&session).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Fetch a cart by id
#[utoipa::path(
    get,
    path = "/api/v1/cart/{id}",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Cart", body = crate::ApiResponse<CartView>),
        (status = 404, description = "Unknown, expired or foreign cart", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    session: CartSession,
) -> ApiResult<CartView> {
    let view = state.services.cart.get_cart(id, &session).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Empty the cart and drop any applied coupon
#[utoipa::path(
    delete,
    path = "/api/v1/cart/{id}",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Emptied cart", body = crate::ApiResponse<CartView>)
    ),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    session: CartSession,
) -> ApiResult<CartView> {
    let view = state.services.cart.clear_cart(id, &session).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Add a size to the cart, merging into an existing line
#[utoipa::path(
    post,
    path = "/api/v1/cart/{id}/items",
    params(("id" = Uuid, Path, description = "Cart ID")),
    request_body = AddItemInput,
    responses(
        (status = 200, description = "Updated cart", body = crate::ApiResponse<CartView>),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    session: CartSession,
    Json(input): Json<AddItemInput>,
) -> ApiResult<CartView> {
    let view = state.services.cart.add_item(id, &session, input).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Change a line's quantity; zero removes the line
#[utoipa::path(
    put,
    path = "/api/v1/cart/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Cart ID"),
        ("item_id" = Uuid, Path, description = "Cart line ID")
    ),
    request_body = UpdateItemInput,
    responses(
        (status = 200, description = "Updated cart", body = crate::ApiResponse<CartView>),
        (status = 404, description = "Unknown line", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    session: CartSession,
    Json(input): Json<UpdateItemInput>,
) -> ApiResult<CartView> {
    let view = state
        .services
        .cart
        .update_item(id, &session, item_id, input)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Remove a line from the cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Cart ID"),
        ("item_id" = Uuid, Path, description = "Cart line ID")
    ),
    responses(
        (status = 200, description = "Updated cart", body = crate::ApiResponse<CartView>),
        (status = 404, description = "Unknown line", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    session: CartSession,
) -> ApiResult<CartView> {
    let view = state
        .services
        .cart
        .remove_item(id, &session, item_id)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Apply a coupon code to the cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/{id}/apply-coupon",
    params(("id" = Uuid, Path, description = "Cart ID")),
    request_body = ApplyCouponRequest,
    responses(
        (status = 200, description = "Cart with discount", body = crate::ApiResponse<CartView>),
        (status = 422, description = "Coupon not applicable", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn apply_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    session: CartSession,
    Json(request): Json<ApplyCouponRequest>,
) -> ApiResult<CartView> {
    let view = state
        .services
        .cart
        .apply_coupon(id, &session, &request.code)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Drop the coupon from the cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart/{id}/coupon",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Cart without discount", body = crate::ApiResponse<CartView>)
    ),
    tag = "Cart"
)]
pub async fn remove_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    session: CartSession,
) -> ApiResult<CartView> {
    let view = state.services.cart.remove_coupon(id, &session).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Cart routes, nested under `/cart`
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_cart))
        .route("/:id", get(get_cart).delete(clear_cart))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:item_id", put(update_item).delete(remove_item))
        .route("/:id/apply-coupon", post(apply_coupon))
        .route("/:id/coupon", delete(remove_coupon))
}
