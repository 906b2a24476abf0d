//! Order lifecycle tests: tracking, customer history, the admin status
//! walk, cancellation restock and the back-office views.

mod common;

use axum::body::to_bytes;
use axum::http::{header, Method, StatusCode};
use common::{decimal, read_json, TestApp, SESSION_HEADER};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

async fn read_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

/// Places a COD order for one line of `quantity` units and returns the
/// order from the checkout response.
async fn place_cod_order(
    app: &TestApp,
    product: &Value,
    quantity: i64,
    email: &str,
    token: Option<&str>,
) -> Value {
    let (cart_id, session) = app.open_cart().await;
    let response = app
        .cart_request(
            Method::POST,
            &format!("/api/v1/cart/{cart_id}/items"),
            Some(json!({
                "product_id": product["id"],
                "size_id": product["sizes"][0]["id"],
                "quantity": quantity
            })),
            &session,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK, "add line");

    let response = app
        .request_with_headers(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({
                "cart_id": cart_id,
                "email": email,
                "phone": "9876543210",
                "payment_method": "cod",
                "shipping_address": {
                    "name": "Asha Verma",
                    "line1": "12 MG Road",
                    "city": "Bengaluru",
                    "state": "Karnataka",
                    "postal_code": "560001"
                }
            })),
            token,
            &[(SESSION_HEADER, &session)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED, "place order");
    read_json(response).await["data"].take()
}

async fn set_status(app: &TestApp, order_id: &str, status: &str) -> axum::response::Response {
    app.request_authenticated(
        Method::PUT,
        &format!("/api/v1/admin/orders/{order_id}/status"),
        Some(json!({ "status": status })),
    )
    .await
}

// ==================== Tracking ====================

#[tokio::test]
async fn anyone_can_track_an_order_by_number_and_email() {
    let app = TestApp::new().await;
    let product = app.seed_product("Skip Along", "HH-SA-01", "649.00", 8).await;
    let order = place_cod_order(&app, &product, 1, "parent@example.com", None).await;
    let order_number = order["order_number"].as_str().unwrap();

    // Number and email are case-insensitive on the way in
    let uri = format!(
        "/api/v1/orders/track?order_number={}&email=PARENT@example.com",
        order_number.to_lowercase()
    );
    let response = app.request(Method::GET, &uri, None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["order_number"], *order_number);
    assert_eq!(body["data"]["status"], "confirmed");
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);

    // Wrong email probes nothing
    let uri = format!(
        "/api/v1/orders/track?order_number={order_number}&email=stranger@example.com"
    );
    let response = app.request(Method::GET, &uri, None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::GET,
            "/api/v1/orders/track?order_number=HH-XXXXXX&email=parent@example.com",
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ==================== Customer History ====================

#[tokio::test]
async fn customers_see_only_their_own_orders() {
    let app = TestApp::new().await;
    let product = app.seed_product("Dash Dot", "HH-DD-01", "549.00", 20).await;

    let asha = app.register_customer("asha@example.com").await;
    let meera = app.register_customer("meera@example.com").await;
    let asha_order =
        place_cod_order(&app, &product, 1, "asha@example.com", Some(&asha)).await;
    let meera_order =
        place_cod_order(&app, &product, 2, "meera@example.com", Some(&meera)).await;

    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some(&asha))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(
        body["data"]["items"][0]["order_number"],
        asha_order["order_number"]
    );

    // Detail fetch is scoped to the owner
    let meera_id = meera_order["id"].as_str().unwrap();
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{meera_id}"),
            None,
            Some(&asha),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{meera_id}"),
            None,
            Some(&meera),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["items"][0]["quantity"], 2);

    let response = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ==================== Status Walk ====================

#[tokio::test]
async fn delivery_walk_settles_cod_payment() {
    let app = TestApp::new().await;
    let product = app.seed_product("Zoomer", "HH-ZM-01", "999.00", 10).await;
    let order = place_cod_order(&app, &product, 1, "parent@example.com", None).await;
    let order_id = order["id"].as_str().unwrap();
    assert_eq!(order["payment_status"], "pending");

    let response = set_status(&app, order_id, "packed").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["data"]["status"], "packed");

    // Setting the current status again is a quiet no-op
    let response = set_status(&app, order_id, "packed").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = set_status(&app, order_id, "shipped").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = set_status(&app, order_id, "delivered").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["status"], "delivered");
    assert_eq!(
        body["data"]["payment_status"], "paid",
        "delivery settles cash on delivery"
    );

    // Delivered is terminal
    let response = set_status(&app, order_id, "confirmed").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let response = set_status(&app, order_id, "cancelled").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn skipping_fulfilment_steps_is_a_conflict() {
    let app = TestApp::new().await;
    let product = app.seed_product("Hop Skip", "HH-HS-01", "449.00", 10).await;
    let order = place_cod_order(&app, &product, 1, "parent@example.com", None).await;
    let order_id = order["id"].as_str().unwrap();

    // Confirmed straight to shipped skips packing
    let response = set_status(&app, order_id, "shipped").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Conflict");

    let response = set_status(&app, order_id, "delivered").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let missing = "00000000-0000-0000-0000-000000000000";
    let response = set_status(&app, missing, "packed").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ==================== Cancellation ====================

#[tokio::test]
async fn cancellation_restores_stock_before_shipment_only() {
    let app = TestApp::new().await;
    let product = app.seed_product("Twirl", "HH-TW-01", "749.00", 5).await;
    let order = place_cod_order(&app, &product, 2, "parent@example.com", None).await;
    let order_id = order["id"].as_str().unwrap();

    let response = app
        .request(Method::GET, "/api/v1/products/twirl", None, None)
        .await;
    assert_eq!(read_json(response).await["data"]["sizes"][0]["stock_qty"], 3);

    let response = set_status(&app, order_id, "cancelled").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["payment_status"], "pending", "nothing was paid");

    // The two units went back on the shelf
    let response = app
        .request(Method::GET, "/api/v1/products/twirl", None, None)
        .await;
    assert_eq!(read_json(response).await["data"]["sizes"][0]["stock_qty"], 5);

    // A shipped order is past the point of no return
    let order = place_cod_order(&app, &product, 1, "parent@example.com", None).await;
    let order_id = order["id"].as_str().unwrap();
    set_status(&app, order_id, "packed").await;
    set_status(&app, order_id, "shipped").await;
    let response = set_status(&app, order_id, "cancelled").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ==================== Admin List and Filters ====================

#[tokio::test]
async fn admin_filters_narrow_the_order_list() {
    let app = TestApp::new().await;
    let product = app.seed_product("Glide", "HH-GL-01", "599.00", 30).await;
    place_cod_order(&app, &product, 1, "anita@example.com", None).await;
    let second = place_cod_order(&app, &product, 1, "bela@example.com", None).await;
    place_cod_order(&app, &product, 1, "anita@example.com", None).await;
    set_status(&app, second["id"].as_str().unwrap(), "packed").await;

    let response = app
        .request_authenticated(Method::GET, "/api/v1/admin/orders", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["data"]["total"], 3);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/admin/orders?status=packed", None)
        .await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["order_number"], second["order_number"]);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/admin/orders?search=bela", None)
        .await;
    assert_eq!(read_json(response).await["data"]["total"], 1);

    let response = app
        .request_authenticated(
            Method::GET,
            "/api/v1/admin/orders?payment_method=online",
            None,
        )
        .await;
    assert_eq!(read_json(response).await["data"]["total"], 0);

    // Date window in the future catches nothing
    let response = app
        .request_authenticated(
            Method::GET,
            "/api/v1/admin/orders?from=2099-01-01T00:00:00Z",
            None,
        )
        .await;
    assert_eq!(read_json(response).await["data"]["total"], 0);
}

// ==================== Dashboard ====================

#[tokio::test]
async fn dashboard_counts_revenue_and_flags_low_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product("Last Pairs", "HH-LP-01", "499.00", 3).await;
    place_cod_order(&app, &product, 1, "parent@example.com", None).await;
    let cancelled = place_cod_order(&app, &product, 1, "parent@example.com", None).await;
    set_status(&app, cancelled["id"].as_str().unwrap(), "cancelled").await;

    let response = app
        .request_authenticated(Method::GET, "/api/v1/admin/dashboard", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = read_json(response).await["data"].take();

    // Every status is reported, zero or not
    let by_status = data["orders_by_status"].as_array().unwrap();
    assert_eq!(by_status.len(), 6);
    let count_of = |status: &str| {
        by_status
            .iter()
            .find(|row| row["status"] == status)
            .map(|row| row["count"].as_i64().unwrap())
            .unwrap()
    };
    assert_eq!(count_of("confirmed"), 1);
    assert_eq!(count_of("cancelled"), 1);
    assert_eq!(count_of("shipped"), 0);

    // Cancelled orders do not count as revenue
    assert_eq!(decimal(&data["revenue"]["today"]), dec!(578.00));
    assert_eq!(decimal(&data["revenue"]["week"]), dec!(578.00));

    let low = data["low_stock"].as_array().unwrap();
    let entry = low
        .iter()
        .find(|row| row["product_name"] == "Last Pairs")
        .expect("size should be flagged as low stock");
    assert_eq!(entry["size_label"], "UK 10");
    assert_eq!(entry["stock_qty"], 2);

    assert_eq!(
        data["recent_orders"].as_array().unwrap().len(),
        2,
        "both orders are recent"
    );
}

// ==================== CSV Export ====================

#[tokio::test]
async fn export_writes_one_csv_row_per_order_line() {
    let app = TestApp::new().await;
    let product = app
        .seed_product_with(
            "Twin Sizes",
            "HH-TS-01",
            "499.00",
            0,
            json!({
                "sizes": [
                    { "size_label": "UK 10", "eu_size": 28, "stock_qty": 4 },
                    { "size_label": "UK 11", "eu_size": 29, "stock_qty": 4 }
                ]
            }),
        )
        .await;

    let (cart_id, session) = app.open_cart().await;
    for size in product["sizes"].as_array().unwrap() {
        let response = app
            .cart_request(
                Method::POST,
                &format!("/api/v1/cart/{cart_id}/items"),
                Some(json!({
                    "product_id": product["id"],
                    "size_id": size["id"],
                    "quantity": 1
                })),
                &session,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app
        .request_with_headers(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({
                "cart_id": cart_id,
                "email": "parent@example.com",
                "phone": "9876543210",
                "payment_method": "cod",
                "shipping_address": {
                    "name": "Asha Verma",
                    "line1": "12 MG Road",
                    "city": "Bengaluru",
                    "state": "Karnataka",
                    "postal_code": "560001"
                }
            })),
            None,
            &[(SESSION_HEADER, &session)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = read_json(response).await["data"].take();
    let order_number = order["order_number"].as_str().unwrap();

    let response = app
        .request_authenticated(Method::GET, "/api/v1/admin/orders/export", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"orders.csv\""
    );

    let csv = read_text(response).await;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3, "header plus one row per line item");
    assert!(lines[0].starts_with("order_number,placed_at,status,payment_method"));
    assert!(lines[1].contains(order_number) && lines[2].contains(order_number));
    assert!(csv.contains("UK 10"));
    assert!(csv.contains("UK 11"));

    // A window that predates the store exports nothing but the header
    let response = app
        .request_authenticated(
            Method::GET,
            "/api/v1/admin/orders/export?to=2000-01-01T00:00:00Z",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let csv = read_text(response).await;
    assert_eq!(csv.lines().count(), 1);
}
