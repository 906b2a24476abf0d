use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::auth::AuthUser;
use crate::entities::user;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::customers::{AuthOutcome, LoginInput, RegisterInput};
use crate::{ApiResponse, ApiResult};

/// Create a customer account and sign in
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "Account created", body = crate::ApiResponse<AuthOutcome>),
        (status = 400, description = "Invalid email, short password or missing name", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<(StatusCode, Json<ApiResponse<AuthOutcome>>), ServiceError> {
    let outcome = state.services.customers.register(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Signed in", body = crate::ApiResponse<AuthOutcome>),
        (status = 401, description = "Invalid email or password", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> ApiResult<AuthOutcome> {
    let outcome = state.services.customers.login(input).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Profile of the bearer token's owner
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current account", body = crate::ApiResponse<user::Model>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<user::Model> {
    let profile = state.services.customers.profile(user.user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// Auth routes, nested under `/auth`
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}
