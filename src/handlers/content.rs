use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::PaginationParams;
use crate::entities::{contact_message, content_page, setting};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::content::{ContactInput, PageInput, UpdatePageInput};
use crate::{ApiResponse, ApiResult, PaginatedResponse};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ContactsQuery {
    /// Only messages nobody has read yet
    #[serde(default)]
    pub unread: bool,
}

// ==================== Storefront ====================

/// Published content pages (about, shipping policy, and so on)
#[utoipa::path(
    get,
    path = "/api/v1/content",
    responses(
        (status = 200, description = "Published pages", body = crate::ApiResponse<Vec<content_page::Model>>)
    ),
    tag = "Content"
)]
pub async fn list_pages(State(state): State<AppState>) -> ApiResult<Vec<content_page::Model>> {
    let pages = state.services.content.list_pages(false).await?;
    Ok(Json(ApiResponse::success(pages)))
}

/// A published page by slug
#[utoipa::path(
    get,
    path = "/api/v1/content/{slug}",
    params(("slug" = String, Path, description = "Page slug")),
    responses(
        (status = 200, description = "Page", body = crate::ApiResponse<content_page::Model>),
        (status = 404, description = "Unknown or unpublished page", body = crate::errors::ErrorResponse)
    ),
    tag = "Content"
)]
pub async fn get_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<content_page::Model> {
    let page = state.services.content.get_page(&slug).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Store settings safe to show in the storefront
#[utoipa::path(
    get,
    path = "/api/v1/settings",
    responses(
        (status = 200, description = "Public settings as a key/value map", body = crate::ApiResponse<BTreeMap<String, String>>)
    ),
    tag = "Content"
)]
pub async fn public_settings(
    State(state): State<AppState>,
) -> ApiResult<BTreeMap<String, String>> {
    let settings = state.services.content.public_settings().await?;
    Ok(Json(ApiResponse::success(settings)))
}

/// Send a message through the contact form
#[utoipa::path(
    post,
    path = "/api/v1/contacts",
    request_body = ContactInput,
    responses(
        (status = 201, description = "Message received", body = crate::ApiResponse<contact_message::Model>),
        (status = 400, description = "Missing name, email or message", body = crate::errors::ErrorResponse)
    ),
    tag = "Content"
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(input): Json<ContactInput>,
) -> Result<(StatusCode, Json<ApiResponse<contact_message::Model>>), ServiceError> {
    let message = state.services.content.submit_contact(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(message))))
}

// ==================== Admin: pages ====================

/// All pages, drafts included
#[utoipa::path(
    get,
    path = "/api/v1/admin/content",
    responses(
        (status = 200, description = "All pages", body = crate::ApiResponse<Vec<content_page::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_pages(State(state): State<AppState>) -> ApiResult<Vec<content_page::Model>> {
    let pages = state.services.content.list_pages(true).await?;
    Ok(Json(ApiResponse::success(pages)))
}

/// Create a content page
#[utoipa::path(
    post,
    path = "/api/v1/admin/content",
    request_body = PageInput,
    responses(
        (status = 201, description = "Page created", body = crate::ApiResponse<content_page::Model>),
        (status = 400, description = "Missing slug, title or body", body = crate::errors::ErrorResponse),
        (status = 409, description = "Slug already used", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_page(
    State(state): State<AppState>,
    Json(input): Json<PageInput>,
) -> Result<(StatusCode, Json<ApiResponse<content_page::Model>>), ServiceError> {
    let page = state.services.content.create_page(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(page))))
}

/// Update a page's title, body or published flag. The slug is fixed.
#[utoipa::path(
    put,
    path = "/api/v1/admin/content/{slug}",
    params(("slug" = String, Path, description = "Page slug")),
    request_body = UpdatePageInput,
    responses(
        (status = 200, description = "Page updated", body = crate::ApiResponse<content_page::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(input): Json<UpdatePageInput>,
) -> ApiResult<content_page::Model> {
    let page = state.services.content.update_page(&slug, input).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Delete a page
#[utoipa::path(
    delete,
    path = "/api/v1/admin/content/{slug}",
    params(("slug" = String, Path, description = "Page slug")),
    responses(
        (status = 204, description = "Page deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ServiceError> {
    state.services.content.delete_page(&slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Admin: contacts ====================

/// Contact-form inbox, optionally narrowed to unread messages
#[utoipa::path(
    get,
    path = "/api/v1/admin/contacts",
    params(PaginationParams, ContactsQuery),
    responses(
        (status = 200, description = "Messages, newest first", body = crate::ApiResponse<crate::PaginatedResponse<contact_message::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_contacts(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<ContactsQuery>,
) -> ApiResult<PaginatedResponse<contact_message::Model>> {
    let (page, per_page) = pagination.clamped(state.config.api_max_page_size);
    let (messages, total) = state
        .services
        .content
        .list_contacts(filter.unread, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        messages, total, page, per_page,
    ))))
}

/// Mark a message read. Already-read messages are returned unchanged.
#[utoipa::path(
    put,
    path = "/api/v1/admin/contacts/{id}/read",
    params(("id" = Uuid, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Message", body = crate::ApiResponse<contact_message::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn mark_contact_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<contact_message::Model> {
    let message = state.services.content.mark_contact_read(id).await?;
    Ok(Json(ApiResponse::success(message)))
}

// ==================== Admin: settings ====================

/// Every setting row, public or not
#[utoipa::path(
    get,
    path = "/api/v1/admin/settings",
    responses(
        (status = 200, description = "All settings", body = crate::ApiResponse<Vec<setting::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_settings(State(state): State<AppState>) -> ApiResult<Vec<setting::Model>> {
    let settings = state.services.content.list_settings().await?;
    Ok(Json(ApiResponse::success(settings)))
}

/// Upsert settings from a key/value map. Keys not in the map are left alone.
#[utoipa::path(
    put,
    path = "/api/v1/admin/settings",
    request_body = BTreeMap<String, String>,
    responses(
        (status = 200, description = "Updated settings", body = crate::ApiResponse<Vec<setting::Model>>),
        (status = 400, description = "Empty map", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    Json(values): Json<BTreeMap<String, String>>,
) -> ApiResult<Vec<setting::Model>> {
    let settings = state.services.content.upsert_settings(values).await?;
    Ok(Json(ApiResponse::success(settings)))
}

/// Public page routes, nested under `/content`
pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_pages))
        .route("/:slug", get(get_page))
}

/// Admin page routes, nested under `/admin/content`
pub fn admin_content_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all_pages).post(create_page))
        .route("/:slug", put(update_page).delete(delete_page))
}

/// Admin inbox routes, nested under `/admin/contacts`
pub fn admin_contact_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contacts))
        .route("/:id/read", put(mark_contact_read))
}
