use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use super::common::PaginationParams;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::catalog::{
    CreateCategoryInput, CreateProductInput, ProductDetail, ProductFilter, SizeInput,
    UpdateCategoryInput, UpdateProductInput,
};
use crate::services::csv_io::ProductImportReport;
use crate::{entities, ApiResponse, ApiResult, PaginatedResponse};

// ==================== Storefront ====================

/// List active products with storefront filters
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(PaginationParams, ProductFilter),
    responses(
        (status = 200, description = "Product list", body = crate::ApiResponse<crate::PaginatedResponse<entities::product::Model>>)
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<PaginatedResponse<entities::product::Model>> {
    let (page, per_page) = pagination.clamped(state.config.api_max_page_size);
    let (products, total) = state
        .services
        .catalog
        .list_products(filter, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        products, total, page, per_page,
    ))))
}

/// Product page payload: sizes with stock, category, rating and share links
#[utoipa::path(
    get,
    path = "/api/v1/products/{slug}",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Product detail", body = crate::ApiResponse<ProductDetail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<ProductDetail> {
    let detail = state.services.catalog.get_product_by_slug(&slug).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// List active categories in display order
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "Category list", body = crate::ApiResponse<Vec<entities::category::Model>>)
    ),
    tag = "Catalog"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> ApiResult<Vec<entities::category::Model>> {
    let categories = state.services.catalog.list_categories(false).await?;
    Ok(Json(ApiResponse::success(categories)))
}

// ==================== Admin: products ====================

/// List every product, archived ones included
#[utoipa::path(
    get,
    path = "/api/v1/admin/products",
    params(PaginationParams, ProductFilter),
    responses(
        (status = 200, description = "Product list", body = crate::ApiResponse<crate::PaginatedResponse<entities::product::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_products(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(mut filter): Query<ProductFilter>,
) -> ApiResult<PaginatedResponse<entities::product::Model>> {
    filter.include_inactive = true;
    let (page, per_page) = pagination.clamped(state.config.api_max_page_size);
    let (products, total) = state
        .services
        .catalog
        .list_products(filter, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        products, total, page, per_page,
    ))))
}

/// Create a product, optionally with its size run
#[utoipa::path(
    post,
    path = "/api/v1/admin/products",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created", body = crate::ApiResponse<entities::product::Model>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate slug or SKU", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProductInput>,
) -> Result<(StatusCode, Json<ApiResponse<entities::product::Model>>), ServiceError> {
    let product = state.services.catalog.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

/// Update product fields
#[utoipa::path(
    put,
    path = "/api/v1/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductInput,
    responses(
        (status = 200, description = "Product updated", body = crate::ApiResponse<entities::product::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> ApiResult<entities::product::Model> {
    let product = state.services.catalog.update_product(id, input).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// Archive a product so it disappears from the storefront
#[utoipa::path(
    delete,
    path = "/api/v1/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product archived"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn archive_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.catalog.archive_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the product's size run in one shot
#[utoipa::path(
    put,
    path = "/api/v1/admin/products/{id}/sizes",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = Vec<SizeInput>,
    responses(
        (status = 200, description = "Sizes replaced", body = crate::ApiResponse<Vec<entities::product_size::Model>>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn replace_product_sizes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(sizes): Json<Vec<SizeInput>>,
) -> ApiResult<Vec<entities::product_size::Model>> {
    let sizes = state.services.catalog.replace_sizes(id, sizes).await?;
    Ok(Json(ApiResponse::success(sizes)))
}

/// Bulk import products from a CSV body
#[utoipa::path(
    post,
    path = "/api/v1/admin/products/import",
    request_body(content = String, content_type = "text/csv"),
    responses(
        (status = 200, description = "Import report", body = crate::ApiResponse<ProductImportReport>),
        (status = 400, description = "Unusable CSV", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn import_products(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<ProductImportReport> {
    let report = state.services.csv.import_products(&body).await?;
    Ok(Json(ApiResponse::success(report)))
}

// ==================== Admin: categories ====================

/// List every category, inactive ones included
#[utoipa::path(
    get,
    path = "/api/v1/admin/categories",
    responses(
        (status = 200, description = "Category list", body = crate::ApiResponse<Vec<entities::category::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_categories(
    State(state): State<AppState>,
) -> ApiResult<Vec<entities::category::Model>> {
    let categories = state.services.catalog.list_categories(true).await?;
    Ok(Json(ApiResponse::success(categories)))
}

/// Create a category
#[utoipa::path(
    post,
    path = "/api/v1/admin/categories",
    request_body = CreateCategoryInput,
    responses(
        (status = 201, description = "Category created", body = crate::ApiResponse<entities::category::Model>),
        (status = 409, description = "Duplicate slug", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<ApiResponse<entities::category::Model>>), ServiceError> {
    let category = state.services.catalog.create_category(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(category))))
}

/// Update a category
#[utoipa::path(
    put,
    path = "/api/v1/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategoryInput,
    responses(
        (status = 200, description = "Category updated", body = crate::ApiResponse<entities::category::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCategoryInput>,
) -> ApiResult<entities::category::Model> {
    let category = state.services.catalog.update_category(id, input).await?;
    Ok(Json(ApiResponse::success(category)))
}

/// Delete a category; its products are left uncategorised
#[utoipa::path(
    delete,
    path = "/api/v1/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.catalog.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Routers ====================

/// Public catalog routes, nested under `/products`
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:slug", get(get_product))
        .route(
            "/:slug/reviews",
            get(super::reviews::list_product_reviews).post(super::reviews::submit_review),
        )
}

/// Admin product routes, nested under `/admin/products`
pub fn admin_product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all_products).post(create_product))
        .route("/import", post(import_products))
        .route("/:id", put(update_product).delete(archive_product))
        .route("/:id/sizes", put(replace_product_sizes))
}

/// Admin category routes, nested under `/admin/categories`
pub fn admin_category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all_categories).post(create_category))
        .route("/:id", put(update_category).delete(delete_category))
}
