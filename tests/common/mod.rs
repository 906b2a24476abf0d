use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Extension, Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use happy_hopz_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db, events,
    events::EventSender,
    handlers::AppServices,
    services::notifications::NotificationService,
    AppState,
};

/// Session header the cart extractor reads for guest carts.
pub const SESSION_HEADER: &str = "x-session-token";

pub const ADMIN_EMAIL: &str = "admin@happyhopz.test";
pub const ADMIN_PASSWORD: &str = "test-admin-password";

/// Not the bundled development secret; long enough for the validator.
const TEST_JWT_SECRET: &str = "kQ7vXz3mWn9pLr4tYu8sDf2gHj5bNc6eRa1iKo0qZxUvMwEyTl9hPd3sBf7jGn2r";

/// Helper harness that boots the full `/api/v1` router against a throwaway
/// SQLite database, so tests cross the real extractors, middleware and
/// services instead of poking services directly.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    admin_token: String,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    /// Construct a test application with a fresh database and seeded admin.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Same as [`TestApp::new`] but lets the test adjust the config before
    /// anything boots (payment gateway URLs, feature toggles and the like).
    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("happy_hopz_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.admin_email = Some(ADMIN_EMAIL.to_string());
        cfg.admin_password = Some(ADMIN_PASSWORD.to_string());
        tweak(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("create test database");
        db::run_migrations(&pool)
            .await
            .expect("run migrations in tests");

        let db_arc = Arc::new(pool);
        let config = Arc::new(cfg);

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let http = reqwest::Client::new();

        // WhatsApp credentials are unset, so the worker only logs.
        let notifier = Arc::new(NotificationService::new(
            db_arc.clone(),
            http.clone(),
            config.clone(),
        ));
        let event_task = tokio::spawn(events::process_events(event_rx, notifier));

        let auth_service = Arc::new(AuthService::new(AuthConfig::from_app_config(&config)));

        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            auth_service.clone(),
            http,
            config.clone(),
        );
        services
            .customers
            .ensure_admin_account()
            .await
            .expect("seed admin account");

        let state = AppState {
            db: db_arc,
            config,
            event_sender,
            auth_service: auth_service.clone(),
            services,
        };

        let router = Router::new()
            .nest("/api/v1", happy_hopz_api::api_v1_routes())
            // The auth extractors read the service from request extensions
            .layer(Extension(auth_service))
            .layer(axum::middleware::from_fn(
                happy_hopz_api::tracing::request_id_middleware,
            ))
            .with_state(state.clone());

        let mut app = Self {
            router,
            state,
            admin_token: String::new(),
            _event_task: event_task,
            _db_dir: db_dir,
        };
        app.admin_token = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        app
    }

    /// Bearer token for the seeded admin account.
    pub fn token(&self) -> &str {
        &self.admin_token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, token, &[])
            .await
    }

    /// Convenience helper for admin-authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(&self.admin_token))
            .await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a non-JSON body, e.g. a CSV upload.
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        body: Vec<u8>,
        content_type: &str,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", content_type);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        let request = builder.body(Body::from(body)).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Cart request carrying the guest session header.
    pub async fn cart_request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        session: &str,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, None, &[(SESSION_HEADER, session)])
            .await
    }

    /// Log in and return the bearer token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({ "email": email, "password": password })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login failed for {}", email);
        let body = read_json(response).await;
        body["data"]["token"]
            .as_str()
            .expect("login response carries a token")
            .to_string()
    }

    /// Register a storefront customer and return their bearer token.
    pub async fn register_customer(&self, email: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                Some(json!({
                    "email": email,
                    "password": "shoelaces-and-straps",
                    "full_name": "Test Shopper",
                    "phone": "9876543210"
                })),
                None,
            )
            .await;
        assert_eq!(
            response.status(),
            StatusCode::CREATED,
            "registration failed for {}",
            email
        );
        let body = read_json(response).await;
        body["data"]["token"]
            .as_str()
            .expect("register response carries a token")
            .to_string()
    }

    /// Open a guest cart and return `(cart id, session token)`.
    pub async fn open_cart(&self) -> (String, String) {
        let response = self.request(Method::POST, "/api/v1/cart", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        let id = body["data"]["id"].as_str().expect("cart id").to_string();
        let session = body["data"]["session_token"]
            .as_str()
            .expect("cart session token")
            .to_string();
        (id, session)
    }

    /// Seed a product with one size via the admin API and return the
    /// storefront detail, which carries the size ids the cart needs.
    pub async fn seed_product(&self, name: &str, sku: &str, price: &str, stock: i64) -> Value {
        self.seed_product_with(name, sku, price, stock, json!({})).await
    }

    /// `extra` is merged into the create payload for tests that need
    /// categories, genders or multiple sizes.
    pub async fn seed_product_with(
        &self,
        name: &str,
        sku: &str,
        price: &str,
        stock: i64,
        extra: Value,
    ) -> Value {
        let mut payload = json!({
            "name": name,
            "sku": sku,
            "price": price,
            "sizes": [
                { "size_label": "UK 10", "eu_size": 28, "stock_qty": stock }
            ]
        });
        if let (Some(base), Some(overrides)) = (payload.as_object_mut(), extra.as_object()) {
            for (key, value) in overrides {
                base.insert(key.clone(), value.clone());
            }
        }

        let response = self
            .request_authenticated(Method::POST, "/api/v1/admin/products", Some(payload))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "seed product {}", sku);
        let created = read_json(response).await;
        let slug = created["data"]["slug"].as_str().expect("product slug");

        let detail = self
            .request(Method::GET, &format!("/api/v1/products/{}", slug), None, None)
            .await;
        assert_eq!(detail.status(), StatusCode::OK);
        let mut body = read_json(detail).await;
        body["data"].take()
    }

    /// Seed a category via the admin API and return its JSON.
    pub async fn seed_category(&self, name: &str) -> Value {
        let response = self
            .request_authenticated(
                Method::POST,
                "/api/v1/admin/categories",
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "seed category {}", name);
        let mut body = read_json(response).await;
        body["data"].take()
    }

    /// Seed an active coupon via the admin API and return its JSON.
    pub async fn seed_coupon(&self, code: &str, discount_type: &str, value: &str) -> Value {
        self.seed_coupon_with(json!({
            "code": code,
            "discount_type": discount_type,
            "discount_value": value
        }))
        .await
    }

    pub async fn seed_coupon_with(&self, payload: Value) -> Value {
        let response = self
            .request_authenticated(Method::POST, "/api/v1/admin/coupons", Some(payload))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "seed coupon");
        let mut body = read_json(response).await;
        body["data"].take()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Read a response body as JSON; empty bodies (204s) come back as `Null`.
pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is valid JSON")
    }
}

/// Decimals serialize as JSON strings; parse them for arithmetic asserts.
pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected a decimal value, got {}", other),
    }
}
