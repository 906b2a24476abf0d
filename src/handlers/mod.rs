pub mod addresses;
pub mod auth;
pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod common;
pub mod content;
pub mod coupons;
pub mod orders;
pub mod payments;
pub mod reviews;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{
    cart::CartService, catalog::CatalogService, checkout::CheckoutService,
    content::ContentService, coupons::CouponService, csv_io::CsvService,
    customers::CustomerService, orders::OrderService, payments::PaymentService,
    reviews::ReviewService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub coupons: Arc<CouponService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub customers: Arc<CustomerService>,
    pub reviews: Arc<ReviewService>,
    pub content: Arc<ContentService>,
    pub csv: Arc<CsvService>,
}

impl AppServices {
    /// Wire every service against one database handle and event channel.
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
        http: reqwest::Client,
        config: Arc<AppConfig>,
    ) -> Self {
        let catalog = Arc::new(CatalogService::new(
            db.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let coupons = Arc::new(CouponService::new(db.clone(), event_sender.clone()));
        let cart = Arc::new(CartService::new(
            db.clone(),
            coupons.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let payments = Arc::new(PaymentService::new(
            db.clone(),
            http,
            event_sender.clone(),
            config.clone(),
        ));
        let checkout = Arc::new(CheckoutService::new(
            db.clone(),
            cart.clone(),
            payments.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let orders = Arc::new(OrderService::new(db.clone(), event_sender.clone()));
        let customers = Arc::new(CustomerService::new(
            db.clone(),
            auth_service,
            event_sender.clone(),
            config,
        ));
        let reviews = Arc::new(ReviewService::new(db.clone(), event_sender.clone()));
        let content = Arc::new(ContentService::new(db.clone(), event_sender));
        let csv = Arc::new(CsvService::new(db, catalog.clone()));

        Self {
            catalog,
            cart,
            checkout,
            coupons,
            orders,
            payments,
            customers,
            reviews,
            content,
            csv,
        }
    }
}
