use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Happy Hopz API",
        description = r#"
# Happy Hopz Storefront API

The REST backend for the Happy Hopz kids' footwear store: catalog browsing,
guest and signed-in carts, coupon-aware checkout with a payment-gateway
handoff, order tracking, product reviews and the back-office admin surface.

## Authentication

Customer and admin endpoints use JWT bearer tokens issued by
`/api/v1/auth/login`:

```
Authorization: Bearer <your-jwt-token>
```

Guest carts are keyed by an `X-Session-Token` header instead; catalog and
content endpoints need no credentials at all.

## Pagination

List endpoints accept `page` (default 1) and `per_page` (default 20, capped
by server config) and reply with `items`, `total`, `page`, `per_page` and
`total_pages`.

## Error Handling

Errors share one shape with appropriate HTTP status codes:

```json
{
  "success": false,
  "error": "Not Found",
  "message": "Product not found",
  "timestamp": "2025-01-01T00:00:00Z"
}
```
        "#,
        contact(
            name = "Happy Hopz Support",
            email = "support@happyhopz.com",
            url = "https://happyhopz.com"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "https://api.happyhopz.com", description = "Production server"),
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Catalog", description = "Products, categories and reviews"),
        (name = "Cart", description = "Guest and customer carts"),
        (name = "Coupons", description = "Coupon validation"),
        (name = "Checkout", description = "Order placement"),
        (name = "Payments", description = "Gateway verification and webhooks"),
        (name = "Orders", description = "Order history and tracking"),
        (name = "Auth", description = "Accounts and sign-in"),
        (name = "Addresses", description = "Saved delivery addresses"),
        (name = "Content", description = "Pages, settings and contact form"),
        (name = "Admin", description = "Back-office endpoints")
    ),
    modifiers(&SecurityAddon),
    paths(
        // Auth and addresses
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::me,
        crate::handlers::addresses::list_addresses,
        crate::handlers::addresses::create_address,
        crate::handlers::addresses::update_address,
        crate::handlers::addresses::delete_address,

        // Catalog
        crate::handlers::catalog::list_products,
        crate::handlers::catalog::get_product,
        crate::handlers::catalog::list_categories,
        crate::handlers::reviews::list_product_reviews,
        crate::handlers::reviews::submit_review,

        // Cart and checkout
        crate::handlers::carts::create_cart,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::clear_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::apply_coupon,
        crate::handlers::carts::remove_coupon,
        crate::handlers::coupons::validate_coupon,
        crate::handlers::checkout::place_order,
        crate::handlers::payments::verify_payment,
        crate::handlers::payments::payment_webhook,

        // Orders
        crate::handlers::orders::track_order,
        crate::handlers::orders::list_my_orders,
        crate::handlers::orders::get_my_order,

        // Content and store info
        crate::handlers::content::list_pages,
        crate::handlers::content::get_page,
        crate::handlers::content::public_settings,
        crate::handlers::content::submit_contact,

        // Admin
        crate::handlers::catalog::list_all_products,
        crate::handlers::catalog::create_product,
        crate::handlers::catalog::update_product,
        crate::handlers::catalog::archive_product,
        crate::handlers::catalog::replace_product_sizes,
        crate::handlers::catalog::import_products,
        crate::handlers::catalog::list_all_categories,
        crate::handlers::catalog::create_category,
        crate::handlers::catalog::update_category,
        crate::handlers::catalog::delete_category,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::export_orders,
        crate::handlers::orders::dashboard,
        crate::handlers::coupons::list_coupons,
        crate::handlers::coupons::create_coupon,
        crate::handlers::coupons::get_coupon,
        crate::handlers::coupons::update_coupon,
        crate::handlers::coupons::delete_coupon,
        crate::handlers::reviews::list_reviews,
        crate::handlers::reviews::approve_review,
        crate::handlers::reviews::delete_review,
        crate::handlers::content::list_all_pages,
        crate::handlers::content::create_page,
        crate::handlers::content::update_page,
        crate::handlers::content::delete_page,
        crate::handlers::content::list_contacts,
        crate::handlers::content::mark_contact_read,
        crate::handlers::content::list_settings,
        crate::handlers::content::update_settings,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::errors::ErrorResponse,

            // Entities
            crate::entities::product::Model,
            crate::entities::product_size::Model,
            crate::entities::category::Model,
            crate::entities::review::Model,
            crate::entities::user::Model,
            crate::entities::address::Model,
            crate::entities::order::Model,
            crate::entities::order_item::Model,
            crate::entities::coupon::Model,
            crate::entities::content_page::Model,
            crate::entities::contact_message::Model,
            crate::entities::setting::Model,
            crate::entities::product::Gender,
            crate::entities::user::UserRole,
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentMethod,
            crate::entities::order::PaymentStatus,
            crate::entities::coupon::CouponType,

            // Catalog
            crate::services::catalog::ProductDetail,
            crate::services::catalog::RatingSummary,
            crate::services::catalog::ShareUrls,
            crate::services::catalog::CreateProductInput,
            crate::services::catalog::UpdateProductInput,
            crate::services::catalog::SizeInput,
            crate::services::catalog::CreateCategoryInput,
            crate::services::catalog::UpdateCategoryInput,
            crate::services::csv_io::ProductImportReport,
            crate::services::csv_io::RowError,

            // Cart and checkout
            crate::services::cart::CartView,
            crate::services::cart::CartItemView,
            crate::services::cart::AppliedCoupon,
            crate::services::cart::CartTotals,
            crate::services::cart::AddItemInput,
            crate::services::cart::UpdateItemInput,
            crate::handlers::carts::ApplyCouponRequest,
            crate::services::checkout::CheckoutInput,
            crate::services::checkout::ShippingAddressInput,
            crate::services::checkout::CheckoutOutcome,
            crate::services::coupons::CouponQuote,
            crate::services::coupons::CreateCouponInput,
            crate::services::coupons::UpdateCouponInput,
            crate::handlers::coupons::ValidateCouponRequest,
            crate::services::payments::PaymentHandoff,
            crate::services::payments::VerifyPaymentInput,
            crate::services::payments::PaymentVerification,

            // Orders
            crate::services::orders::OrderDetail,
            crate::services::orders::StatusCount,
            crate::services::orders::RevenueSummary,
            crate::services::orders::LowStockSize,
            crate::services::orders::DashboardSummary,
            crate::handlers::orders::UpdateStatusRequest,

            // Accounts and reviews
            crate::services::customers::RegisterInput,
            crate::services::customers::LoginInput,
            crate::services::customers::AuthOutcome,
            crate::services::customers::AddressInput,
            crate::services::reviews::ReviewInput,
            crate::services::reviews::ReviewView,
            crate::services::reviews::AdminReviewView,

            // Content
            crate::services::content::PageInput,
            crate::services::content::UpdatePageInput,
            crate::services::content::ContactInput,
        )
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Happy Hopz API"));
        assert!(json.contains("/api/v1/products"));
        assert!(json.contains("bearer_auth"));
    }
}
