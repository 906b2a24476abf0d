use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

use crate::handlers::AppState;
use crate::services::payments::{PaymentVerification, VerifyPaymentInput, WebhookOutcome};
use crate::{ApiResponse, ApiResult};

/// Header the gateway signs webhook deliveries with.
const WEBHOOK_SIGNATURE_HEADER: &str = "x-gateway-signature";

/// Verify the signature the storefront got back from the payment widget
#[utoipa::path(
    post,
    path = "/api/v1/payments/verify",
    request_body = VerifyPaymentInput,
    responses(
        (status = 200, description = "Payment captured", body = crate::ApiResponse<PaymentVerification>),
        (status = 404, description = "Unknown gateway order", body = crate::errors::ErrorResponse),
        (status = 422, description = "Signature mismatch", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(input): Json<VerifyPaymentInput>,
) -> ApiResult<PaymentVerification> {
    let verification = state.services.payments.verify_payment(input).await?;
    Ok(Json(ApiResponse::success(verification)))
}

/// Gateway webhook endpoint
///
/// No bearer auth; the HMAC signature on the raw body is the authentication.
/// Unknown events and unknown orders are acknowledged so the gateway stops
/// retrying them.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = Value,
    responses(
        (status = 200, description = "Webhook acknowledged", body = crate::ApiResponse<Value>),
        (status = 400, description = "Missing signature header", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Value> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = state
        .services
        .payments
        .handle_webhook(&body, signature)
        .await?;
    let status = match outcome {
        WebhookOutcome::Processed => "processed",
        WebhookOutcome::Ignored => "ignored",
    };
    Ok(Json(ApiResponse::success(json!({ "status": status }))))
}

/// Payment routes, nested under `/payments`
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/verify", post(verify_payment))
        .route("/webhook", post(payment_webhook))
}
