//! Content, settings, contact-inbox and review-moderation tests.

mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, read_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

// ==================== Pages ====================

#[tokio::test]
async fn published_pages_are_public_and_drafts_are_not() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/admin/content",
            Some(json!({
                "slug": "about-us",
                "title": "About Us",
                "body": "Two parents, one garage full of tiny shoes.",
                "is_published": true
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // is_published defaults to false: a draft
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/admin/content",
            Some(json!({
                "slug": "returns-policy",
                "title": "Returns",
                "body": "Thirty days, unworn."
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(read_json(response).await["data"]["is_published"], false);

    let response = app.request(Method::GET, "/api/v1/content", None, None).await;
    let body = read_json(response).await;
    let pages = body["data"].as_array().unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0]["slug"], "about-us");

    let response = app
        .request(Method::GET, "/api/v1/content/about-us", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["data"]["title"], "About Us");

    let response = app
        .request(Method::GET, "/api/v1/content/returns-policy", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The admin listing sees drafts too
    let response = app
        .request_authenticated(Method::GET, "/api/v1/admin/content", None)
        .await;
    assert_eq!(read_json(response).await["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn page_slugs_are_unique_immutable_and_validated() {
    let app = TestApp::new().await;
    let create = |slug: &str, title: &str| {
        json!({ "slug": slug, "title": title, "body": "...", "is_published": true })
    };

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/admin/content",
            Some(create("size-guide", "Size Guide")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/admin/content",
            Some(create("size-guide", "Other")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    for bad in [
        create("Size Guide!", "Spaces and punctuation"),
        create("", "Empty slug"),
        create("faq", ""),
    ] {
        let response = app
            .request_authenticated(Method::POST, "/api/v1/admin/content", Some(bad))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // Updates go by slug and leave the slug alone
    let response = app
        .request_authenticated(
            Method::PUT,
            "/api/v1/admin/content/size-guide",
            Some(json!({ "title": "Fitting Guide", "is_published": false })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = read_json(response).await;
    assert_eq!(page["data"]["title"], "Fitting Guide");
    assert_eq!(page["data"]["slug"], "size-guide");

    // Unpublished now, gone from the storefront
    let response = app
        .request(Method::GET, "/api/v1/content/size-guide", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request_authenticated(
            Method::PUT,
            "/api/v1/admin/content/size-guide",
            Some(json!({ "title": "   " })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_authenticated(
            Method::PUT,
            "/api/v1/admin/content/no-such-page",
            Some(json!({ "title": "X" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request_authenticated(Method::DELETE, "/api/v1/admin/content/size-guide", None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app
        .request_authenticated(Method::DELETE, "/api/v1/admin/content/size-guide", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ==================== Settings ====================

#[tokio::test]
async fn storefront_settings_expose_only_the_public_subset() {
    let app = TestApp::new().await;

    // Nothing seeded yet
    let response = app.request(Method::GET, "/api/v1/settings", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["data"], json!({}));

    let response = app
        .request_authenticated(
            Method::PUT,
            "/api/v1/admin/settings",
            Some(json!({
                "store_name": "Happy Hopz",
                "support_email": "care@happyhopz.in",
                "announcement": "Monsoon sale is on!",
                "admin_alert_email": "ops@happyhopz.in"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rows = read_json(response).await;
    assert_eq!(rows["data"].as_array().unwrap().len(), 4);

    // Shoppers get the whitelisted keys as a flat map, nothing internal
    let response = app.request(Method::GET, "/api/v1/settings", None, None).await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["store_name"], "Happy Hopz");
    assert_eq!(body["data"]["announcement"], "Monsoon sale is on!");
    assert!(body["data"].get("admin_alert_email").is_none());

    // Upserting an existing key overwrites in place
    let response = app
        .request_authenticated(
            Method::PUT,
            "/api/v1/admin/settings",
            Some(json!({ "announcement": "" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.request(Method::GET, "/api/v1/settings", None, None).await;
    assert_eq!(read_json(response).await["data"]["announcement"], "");

    let response = app
        .request_authenticated(Method::PUT, "/api/v1/admin/settings", Some(json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ==================== Contact Inbox ====================

#[tokio::test]
async fn contact_form_lands_in_the_admin_inbox() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/contacts",
            Some(json!({
                "name": "Asha Verma",
                "email": "Asha@Example.com",
                "phone": "9876543210",
                "subject": "Wrong size delivered",
                "message": "Ordered UK 10, UK 8 arrived."
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let first = read_json(response).await["data"].take();
    assert_eq!(first["email"], "asha@example.com");
    assert_eq!(first["is_read"], false);

    let response = app
        .request(
            Method::POST,
            "/api/v1/contacts",
            Some(json!({
                "name": "Meera",
                "email": "meera@example.com",
                "message": "Do you stock EU 30?"
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    for bad in [
        json!({ "name": " ", "email": "a@b.com", "message": "hi" }),
        json!({ "name": "A", "email": "not-an-email", "message": "hi" }),
        json!({ "name": "A", "email": "a@b.com", "message": "  " }),
    ] {
        let response = app
            .request(Method::POST, "/api/v1/contacts", Some(bad), None)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .request_authenticated(Method::GET, "/api/v1/admin/contacts", None)
        .await;
    assert_eq!(read_json(response).await["data"]["total"], 2);

    let first_id = first["id"].as_str().unwrap();
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/admin/contacts/{first_id}/read"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["data"]["is_read"], true);

    // Marking twice changes nothing
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/admin/contacts/{first_id}/read"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/admin/contacts?unread=true", None)
        .await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["email"], "meera@example.com");

    let response = app
        .request_authenticated(
            Method::PUT,
            "/api/v1/admin/contacts/00000000-0000-0000-0000-000000000000/read",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ==================== Reviews ====================

#[tokio::test]
async fn reviews_show_on_the_storefront_only_after_approval() {
    let app = TestApp::new().await;
    app.seed_product("Star Steps", "HH-SS-01", "899.00", 5).await;
    let token = app.register_customer("asha@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products/star-steps/reviews",
            Some(json!({
                "rating": 5,
                "title": "Perfect fit",
                "body": "Survived a full monsoon of puddle jumping."
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let review = read_json(response).await["data"].take();
    assert_eq!(review["is_approved"], false);
    let review_id = review["id"].as_str().unwrap();

    // Invisible until moderated
    let response = app
        .request(Method::GET, "/api/v1/products/star-steps/reviews", None, None)
        .await;
    assert_eq!(read_json(response).await["data"]["total"], 0);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/admin/reviews?pending=true", None)
        .await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["reviewer_name"], "Test Shopper");
    assert_eq!(body["data"]["items"][0]["product_name"], "Star Steps");

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/admin/reviews/{review_id}/approve"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["data"]["is_approved"], true);

    // Approving twice is harmless
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/admin/reviews/{review_id}/approve"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Storefront shows the first name only
    let response = app
        .request(Method::GET, "/api/v1/products/star-steps/reviews", None, None)
        .await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["reviewer"], "Test");
    assert_eq!(body["data"]["items"][0]["rating"], 5);

    // And the product page aggregates it
    let response = app
        .request(Method::GET, "/api/v1/products/star-steps", None, None)
        .await;
    let detail = read_json(response).await;
    assert_eq!(detail["data"]["rating"]["count"], 1);
    assert_eq!(decimal(&detail["data"]["rating"]["average"]), dec!(5));

    let response = app
        .request_authenticated(Method::GET, "/api/v1/admin/reviews?pending=true", None)
        .await;
    assert_eq!(read_json(response).await["data"]["total"], 0);
}

#[tokio::test]
async fn review_submission_rules_hold() {
    let app = TestApp::new().await;
    app.seed_product("Mud Mates", "HH-MM-01", "699.00", 5).await;
    let token = app.register_customer("asha@example.com").await;
    let review = json!({ "rating": 4, "body": "Good grip." });

    // Sign-in required
    let response = app
        .request(
            Method::POST,
            "/api/v1/products/mud-mates/reviews",
            Some(review.clone()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    for bad_rating in [0, 6] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/products/mud-mates/reviews",
                Some(json!({ "rating": bad_rating })),
                Some(&token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .request(
            Method::POST,
            "/api/v1/products/no-such-shoe/reviews",
            Some(review.clone()),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::POST,
            "/api/v1/products/mud-mates/reviews",
            Some(review.clone()),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // One review per customer per product
    let response = app
        .request(
            Method::POST,
            "/api/v1/products/mud-mates/reviews",
            Some(review),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn moderation_can_remove_a_review_outright() {
    let app = TestApp::new().await;
    app.seed_product("Splash Guard", "HH-SG-01", "799.00", 5).await;
    let token = app.register_customer("asha@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products/splash-guard/reviews",
            Some(json!({ "rating": 1, "body": "spam spam spam" })),
            Some(&token),
        )
        .await;
    let review_id = read_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/admin/reviews/{review_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/admin/reviews/{review_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/admin/reviews/{review_id}/approve"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/admin/reviews", None)
        .await;
    assert_eq!(read_json(response).await["data"]["total"], 0);
}
