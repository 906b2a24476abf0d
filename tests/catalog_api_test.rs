//! Integration tests for the product catalog.
//!
//! Tests cover:
//! - Product creation through the admin API and the storefront detail page
//! - Listing filters: search, category, gender, price band and sorting
//! - Archiving products off the storefront while keeping them in admin
//! - Category management and the public category list
//! - Size-run replacement and CSV bulk import

mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, read_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

// ==================== Create and detail ====================

#[tokio::test]
async fn created_product_shows_up_on_the_storefront() {
    let app = TestApp::new().await;
    let category = app.seed_category("Sneakers").await;

    let detail = app
        .seed_product_with(
            "Rainbow Sprint",
            "HH-RS-01",
            "499.00",
            10,
            json!({
                "category_id": category["id"],
                "brand": "HopStar",
                "gender": "boys",
                "mrp": "699.00",
                "description": "Light-up soles for the playground"
            }),
        )
        .await;

    assert_eq!(detail["name"], "Rainbow Sprint");
    assert_eq!(detail["slug"], "rainbow-sprint");
    assert_eq!(detail["sku"], "HH-RS-01");
    assert_eq!(detail["gender"], "boys");
    assert_eq!(decimal(&detail["price"]), dec!(499.00));
    assert_eq!(detail["category"]["slug"], "sneakers");
    assert_eq!(detail["sizes"][0]["size_label"], "UK 10");
    assert_eq!(detail["sizes"][0]["stock_qty"], 10);
    // No reviews yet
    assert_eq!(detail["rating"]["count"], 0);
    assert!(detail["rating"]["average"].is_null());
    // Share links point at the product page
    assert!(detail["share_urls"]["whatsapp"]
        .as_str()
        .unwrap()
        .contains("rainbow-sprint"));
    assert!(detail["share_urls"]["telegram"].as_str().is_some());
}

#[tokio::test]
async fn unknown_product_slug_is_404() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api/v1/products/vaporware-velcro", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn skus_are_unique_and_slugs_dedupe() {
    let app = TestApp::new().await;
    app.seed_product("Hop Lite", "HH-HL-01", "399.00", 5).await;

    // Same SKU, case-insensitively, is a conflict
    let duplicate_sku = app
        .request_authenticated(
            Method::POST,
            "/api/v1/admin/products",
            Some(json!({ "name": "Different Name", "sku": "hh-hl-01", "price": "299.00" })),
        )
        .await;
    assert_eq!(duplicate_sku.status(), StatusCode::CONFLICT);

    // Same name gets a fresh slug instead of failing
    let same_name = app.seed_product("Hop Lite", "HH-HL-02", "399.00", 5).await;
    assert_eq!(same_name["slug"], "hop-lite-2");
}

#[tokio::test]
async fn product_creation_validates_prices() {
    let app = TestApp::new().await;

    let zero_price = app
        .request_authenticated(
            Method::POST,
            "/api/v1/admin/products",
            Some(json!({ "name": "Freebie", "sku": "HH-FREE", "price": "0" })),
        )
        .await;
    assert_eq!(zero_price.status(), StatusCode::BAD_REQUEST);

    let mrp_below_price = app
        .request_authenticated(
            Method::POST,
            "/api/v1/admin/products",
            Some(json!({ "name": "Backward Deal", "sku": "HH-BD", "price": "500", "mrp": "400" })),
        )
        .await;
    assert_eq!(mrp_below_price.status(), StatusCode::BAD_REQUEST);
}

// ==================== Listing filters ====================

#[tokio::test]
async fn storefront_filters_narrow_the_list() {
    let app = TestApp::new().await;
    let category = app.seed_category("School Shoes").await;

    app.seed_product_with(
        "Classroom Classic",
        "HH-CC-01",
        "899.00",
        5,
        json!({ "category_id": category["id"], "gender": "boys" }),
    )
    .await;
    app.seed_product_with(
        "Sprint Star",
        "HH-SS-01",
        "1299.00",
        5,
        json!({ "gender": "girls", "brand": "ZoomKids" }),
    )
    .await;
    app.seed_product("Beach Hopper", "HH-BH-01", "349.00", 5).await;

    // Free-text search matches names, `q` being an accepted alias
    let by_search = app
        .request(Method::GET, "/api/v1/products?q=sprint", None, None)
        .await;
    let body = read_json(by_search).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["name"], "Sprint Star");

    // Category filter takes the slug
    let by_category = app
        .request(Method::GET, "/api/v1/products?category=school-shoes", None, None)
        .await;
    let body = read_json(by_category).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["name"], "Classroom Classic");

    // Unknown category is an empty result, not an error
    let unknown_category = app
        .request(Method::GET, "/api/v1/products?category=no-such-thing", None, None)
        .await;
    let body = read_json(unknown_category).await;
    assert_eq!(body["data"]["total"], 0);

    // Price band
    let by_price = app
        .request(
            Method::GET,
            "/api/v1/products?min_price=400&max_price=1000",
            None,
            None,
        )
        .await;
    let body = read_json(by_price).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["name"], "Classroom Classic");

    // Gender
    let by_gender = app
        .request(Method::GET, "/api/v1/products?gender=girls", None, None)
        .await;
    let body = read_json(by_gender).await;
    assert_eq!(body["data"]["total"], 1);

    // Cheapest first
    let sorted = app
        .request(Method::GET, "/api/v1/products?sort=price_asc", None, None)
        .await;
    let body = read_json(sorted).await;
    let prices: Vec<_> = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| decimal(&item["price"]))
        .collect();
    assert_eq!(prices, vec![dec!(349.00), dec!(899.00), dec!(1299.00)]);
}

#[tokio::test]
async fn pagination_clamps_and_reports_totals() {
    let app = TestApp::new().await;
    for i in 0..3 {
        app.seed_product(&format!("Filler {}", i), &format!("HH-F-{}", i), "199.00", 1)
            .await;
    }

    let response = app
        .request(Method::GET, "/api/v1/products?page=1&per_page=2", None, None)
        .await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["per_page"], 2);
    assert_eq!(body["data"]["total_pages"], 2);

    let second = app
        .request(Method::GET, "/api/v1/products?page=2&per_page=2", None, None)
        .await;
    let body = read_json(second).await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
}

// ==================== Archiving ====================

#[tokio::test]
async fn archived_products_leave_the_storefront_but_not_admin() {
    let app = TestApp::new().await;
    let product = app.seed_product("Retired Racer", "HH-RR-01", "799.00", 5).await;
    let id = product["id"].as_str().unwrap();

    let archive = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/admin/products/{}", id),
            None,
        )
        .await;
    assert_eq!(archive.status(), StatusCode::NO_CONTENT);

    let public_detail = app
        .request(Method::GET, "/api/v1/products/retired-racer", None, None)
        .await;
    assert_eq!(public_detail.status(), StatusCode::NOT_FOUND);

    let public_list = app.request(Method::GET, "/api/v1/products", None, None).await;
    let body = read_json(public_list).await;
    assert_eq!(body["data"]["total"], 0);

    let admin_list = app
        .request_authenticated(Method::GET, "/api/v1/admin/products", None)
        .await;
    let body = read_json(admin_list).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["is_active"], false);
}

// ==================== Categories ====================

#[tokio::test]
async fn categories_list_publicly_and_reject_duplicate_slugs() {
    let app = TestApp::new().await;
    app.seed_category("Sandals").await;

    let duplicate = app
        .request_authenticated(
            Method::POST,
            "/api/v1/admin/categories",
            Some(json!({ "name": "Sandals" })),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let public = app.request(Method::GET, "/api/v1/categories", None, None).await;
    assert_eq!(public.status(), StatusCode::OK);
    let body = read_json(public).await;
    assert_eq!(body["data"][0]["slug"], "sandals");
}

// ==================== Size runs ====================

#[tokio::test]
async fn replacing_sizes_updates_and_prunes() {
    let app = TestApp::new().await;
    let product = app.seed_product("Grow Spurts", "HH-GS-01", "599.00", 8).await;
    let id = product["id"].as_str().unwrap();

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/admin/products/{}/sizes", id),
            Some(json!([
                { "size_label": "UK 10", "eu_size": 28, "stock_qty": 3 },
                { "size_label": "UK 11", "eu_size": 29, "stock_qty": 6 }
            ])),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let detail = app
        .request(Method::GET, "/api/v1/products/grow-spurts", None, None)
        .await;
    let body = read_json(detail).await;
    let sizes = body["data"]["sizes"].as_array().unwrap();
    assert_eq!(sizes.len(), 2);
    let updated = sizes
        .iter()
        .find(|s| s["size_label"] == "UK 10")
        .expect("UK 10 still present");
    assert_eq!(updated["stock_qty"], 3);
}

// ==================== CSV import ====================

#[tokio::test]
async fn csv_import_creates_then_updates_by_sku() {
    let app = TestApp::new().await;

    let csv = "sku,name,price,mrp,sizes,gender\n\
               HH-IMP-1,Imported Runner,599,799,UK 8K:26:5|UK 9K:27:3,boys\n\
               HH-IMP-2,Imported Sandal,399,,UK 10K:4,girls\n";
    let response = app
        .request_raw(
            Method::POST,
            "/api/v1/admin/products/import",
            csv.as_bytes().to_vec(),
            "text/csv",
            Some(app.token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["created"], 2);
    assert_eq!(body["data"]["updated"], 0);
    assert!(body["data"]["errors"].as_array().unwrap().is_empty());

    // Re-importing the same SKUs updates in place
    let csv = "sku,name,price\nHH-IMP-1,Imported Runner,649\n";
    let response = app
        .request_raw(
            Method::POST,
            "/api/v1/admin/products/import",
            csv.as_bytes().to_vec(),
            "text/csv",
            Some(app.token()),
        )
        .await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["created"], 0);
    assert_eq!(body["data"]["updated"], 1);

    let detail = app
        .request(Method::GET, "/api/v1/products/imported-runner", None, None)
        .await;
    let body = read_json(detail).await;
    assert_eq!(decimal(&body["data"]["price"]), dec!(649));
}

#[tokio::test]
async fn csv_import_reports_bad_rows_and_missing_sku_column() {
    let app = TestApp::new().await;

    let csv = "sku,name,price\nHH-OK-1,Fine Shoe,499\nHH-BAD-1,Broken Shoe,not-a-price\n";
    let response = app
        .request_raw(
            Method::POST,
            "/api/v1/admin/products/import",
            csv.as_bytes().to_vec(),
            "text/csv",
            Some(app.token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["created"], 1);
    let errors = body["data"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["row"], 3);

    let no_sku = app
        .request_raw(
            Method::POST,
            "/api/v1/admin/products/import",
            b"name,price\nNo Sku Shoe,100\n".to_vec(),
            "text/csv",
            Some(app.token()),
        )
        .await;
    assert_eq!(no_sku.status(), StatusCode::BAD_REQUEST);
}
