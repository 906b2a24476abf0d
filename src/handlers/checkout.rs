use axum::{extract::State, http::StatusCode, Json};

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::cart::CartSession;
use crate::services::checkout::{CheckoutInput, CheckoutOutcome};
use crate::ApiResponse;

/// Turn the caller's cart into an order
///
/// Guests check out with an inline shipping address; signed-in customers may
/// reference a saved one. Online payments come back with the gateway handoff
/// the storefront needs to open the payment widget.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutInput,
    responses(
        (status = 201, description = "Order placed", body = crate::ApiResponse<CheckoutOutcome>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse),
        (status = 404, description = "No active cart", body = crate::errors::ErrorResponse),
        (status = 422, description = "Stock ran out or coupon no longer applies", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn place_order(
    State(state): State<AppState>,
    session: CartSession,
    Json(input): Json<CheckoutInput>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutOutcome>>), ServiceError> {
    let outcome = state.services.checkout.place_order(&session, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}
