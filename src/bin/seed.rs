//! Seed script - populates the database with demo data for development.
//!
//! Run with: cargo run --bin seed
//!
//! This creates:
//! - 5 categories and 8 products with per-size stock
//! - 2 coupons (percentage with cap, flat)
//! - 3 content pages and the public store settings
//! - an admin and a demo customer account
//!
//! The script expects an empty database and exits early if products exist.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{info, warn};
use uuid::Uuid;

use happy_hopz_api::auth::{AuthConfig, AuthService};
use happy_hopz_api::entities::{
    category, content_page,
    coupon::{self, CouponType},
    product::{self, Gender},
    product_size, setting,
    user::{self, UserRole},
};
use happy_hopz_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("=== Happy Hopz Seed Data ===");

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://happy_hopz.sqlite?mode=rwc".to_string());

    info!("Connecting to database: {}", database_url);
    let db = api::db::establish_connection(&database_url).await?;
    api::db::run_migrations(&db).await?;

    let existing = product::Entity::find().count(&db).await?;
    if existing > 0 {
        warn!(
            "Database already has {} products; refusing to seed twice",
            existing
        );
        return Ok(());
    }

    info!("Creating categories...");
    let categories = create_categories(&db).await?;
    info!("  Created {} categories", categories.len());

    info!("Creating products with sizes...");
    let product_count = create_products(&db, &categories).await?;
    info!("  Created {} products", product_count);

    info!("Creating coupons...");
    let coupon_count = create_coupons(&db).await?;
    info!("  Created {} coupons", coupon_count);

    info!("Creating content pages and settings...");
    let page_count = create_pages(&db).await?;
    let setting_count = create_settings(&db).await?;
    info!("  Created {} pages, {} settings", page_count, setting_count);

    info!("Creating accounts...");
    create_accounts(&db).await?;
    info!("  Created admin@happyhopz.com and demo@happyhopz.com (password: hopz1234)");

    info!("=== Seed Complete ===");
    info!("");
    info!("Try these API calls:");
    info!("  curl http://localhost:8080/api/v1/products");
    info!("  curl http://localhost:8080/api/v1/categories");
    info!("  curl http://localhost:8080/api/v1/content");
    info!("");
    info!("Or explore interactively at: http://localhost:8080/swagger-ui");

    Ok(())
}

async fn create_categories(
    db: &sea_orm::DatabaseConnection,
) -> anyhow::Result<Vec<category::Model>> {
    let categories_data = vec![
        ("School Shoes", "school-shoes", "Black and white school shoes that survive the playground"),
        ("Sneakers", "sneakers", "Everyday sneakers for running, jumping and everything between"),
        ("Sandals & Floaters", "sandals-floaters", "Open footwear for summers and rainy days"),
        ("Sports Shoes", "sports-shoes", "Lightweight trainers for the sporty ones"),
        ("Ballerinas", "ballerinas", "Party-ready flats for little dancers"),
    ];

    let mut created = Vec::new();
    let now = Utc::now();

    for (order, (name, slug, description)) in categories_data.into_iter().enumerate() {
        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            description: Set(Some(description.to_string())),
            display_order: Set(order as i32),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        created.push(model.insert(db).await?);
    }

    Ok(created)
}

async fn create_products(
    db: &sea_orm::DatabaseConnection,
    categories: &[category::Model],
) -> anyhow::Result<usize> {
    // (name, slug, sku, category slug, gender, age range, price, mrp, featured)
    let products_data = vec![
        (
            "Velcro School Shoe Black",
            "velcro-school-shoe-black",
            "HH-SCH-001",
            "school-shoes",
            Gender::Unisex,
            "4-8 years",
            dec!(899.00),
            Some(dec!(1099.00)),
            true,
        ),
        (
            "Lace-Up School Shoe White",
            "lace-up-school-shoe-white",
            "HH-SCH-002",
            "school-shoes",
            Gender::Unisex,
            "6-10 years",
            dec!(949.00),
            Some(dec!(1199.00)),
            false,
        ),
        (
            "Rocket Glow Sneaker",
            "rocket-glow-sneaker",
            "HH-SNK-001",
            "sneakers",
            Gender::Boys,
            "3-7 years",
            dec!(1299.00),
            Some(dec!(1599.00)),
            true,
        ),
        (
            "Rainbow Strap Sneaker",
            "rainbow-strap-sneaker",
            "HH-SNK-002",
            "sneakers",
            Gender::Girls,
            "3-7 years",
            dec!(1249.00),
            None,
            true,
        ),
        (
            "Splash Floater Blue",
            "splash-floater-blue",
            "HH-SND-001",
            "sandals-floaters",
            Gender::Unisex,
            "2-6 years",
            dec!(649.00),
            Some(dec!(799.00)),
            false,
        ),
        (
            "Monsoon Sandal Pink",
            "monsoon-sandal-pink",
            "HH-SND-002",
            "sandals-floaters",
            Gender::Girls,
            "2-6 years",
            dec!(699.00),
            None,
            false,
        ),
        (
            "Sprint Trainer Neon",
            "sprint-trainer-neon",
            "HH-SPT-001",
            "sports-shoes",
            Gender::Unisex,
            "6-12 years",
            dec!(1499.00),
            Some(dec!(1899.00)),
            true,
        ),
        (
            "Twinkle Ballerina Gold",
            "twinkle-ballerina-gold",
            "HH-BAL-001",
            "ballerinas",
            Gender::Girls,
            "4-9 years",
            dec!(849.00),
            Some(dec!(999.00)),
            false,
        ),
    ];

    let now = Utc::now();
    let mut count = 0;

    for (name, slug, sku, category_slug, gender, age_range, price, mrp, featured) in products_data
    {
        let category_id = categories
            .iter()
            .find(|c| c.slug == category_slug)
            .map(|c| c.id);

        let product_id = Uuid::new_v4();
        let model = product::ActiveModel {
            id: Set(product_id),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            description: Set(Some(format!(
                "{} from the Happy Hopz collection. Cushioned insole, anti-skid sole.",
                name
            ))),
            category_id: Set(category_id),
            brand: Set(Some("Happy Hopz".to_string())),
            price: Set(price),
            mrp: Set(mrp),
            gst_rate: Set(dec!(12.00)),
            sku: Set(sku.to_string()),
            image_url: Set(Some(format!(
                "https://cdn.happyhopz.com/products/{}.jpg",
                slug
            ))),
            gallery: Set(None),
            gender: Set(gender),
            age_range: Set(Some(age_range.to_string())),
            is_active: Set(true),
            is_featured: Set(featured),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model.insert(db).await?;

        // UK kids sizes 8K-13K mapped to EU 25-31
        for (order, (label, eu)) in [
            ("UK 8K", 25),
            ("UK 9K", 26),
            ("UK 10K", 27),
            ("UK 11K", 28),
            ("UK 12K", 30),
            ("UK 13K", 31),
        ]
        .into_iter()
        .enumerate()
        {
            let size = product_size::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product_id),
                size_label: Set(label.to_string()),
                eu_size: Set(Some(eu)),
                stock_qty: Set(12 - (order as i32 * 2)),
                display_order: Set(order as i32),
            };
            size.insert(db).await?;
        }

        count += 1;
    }

    Ok(count)
}

async fn create_coupons(db: &sea_orm::DatabaseConnection) -> anyhow::Result<usize> {
    let now = Utc::now();

    let welcome = coupon::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set("WELCOME10".to_string()),
        description: Set(Some("10% off your first order, up to Rs. 200".to_string())),
        discount_type: Set(CouponType::Percentage),
        discount_value: Set(dec!(10.00)),
        min_order_amount: Set(dec!(499.00)),
        max_discount_amount: Set(Some(dec!(200.00))),
        max_uses: Set(None),
        used_count: Set(0),
        valid_from: Set(now),
        valid_until: Set(Some(now + Duration::days(365))),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };
    welcome.insert(db).await?;

    let flat = coupon::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set("FLAT100".to_string()),
        description: Set(Some("Rs. 100 off orders above Rs. 999".to_string())),
        discount_type: Set(CouponType::Flat),
        discount_value: Set(dec!(100.00)),
        min_order_amount: Set(dec!(999.00)),
        max_discount_amount: Set(None),
        max_uses: Set(Some(500)),
        used_count: Set(0),
        valid_from: Set(now),
        valid_until: Set(Some(now + Duration::days(90))),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };
    flat.insert(db).await?;

    Ok(2)
}

async fn create_pages(db: &sea_orm::DatabaseConnection) -> anyhow::Result<usize> {
    let pages_data = vec![
        (
            "about-us",
            "About Happy Hopz",
            "Happy Hopz makes playful, durable footwear for kids aged 2 to 12. \
             Every pair is tested on real playgrounds.",
        ),
        (
            "shipping-policy",
            "Shipping Policy",
            "Orders ship within 2 business days. Free shipping above the \
             free-shipping threshold; a flat fee applies below it.",
        ),
        (
            "returns-policy",
            "Returns Policy",
            "Unworn shoes can be returned within 15 days of delivery for a \
             full refund to the original payment method.",
        ),
    ];

    let now = Utc::now();
    let mut count = 0;

    for (slug, title, body) in pages_data {
        let page = content_page::ActiveModel {
            id: Set(Uuid::new_v4()),
            slug: Set(slug.to_string()),
            title: Set(title.to_string()),
            body: Set(body.to_string()),
            is_published: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        page.insert(db).await?;
        count += 1;
    }

    Ok(count)
}

async fn create_settings(db: &sea_orm::DatabaseConnection) -> anyhow::Result<usize> {
    let settings_data = vec![
        ("store_name", "Happy Hopz"),
        ("support_phone", "+91-98765-43210"),
        ("support_email", "support@happyhopz.com"),
        ("whatsapp_number", "+91-98765-43210"),
        ("free_shipping_threshold", "999"),
        ("flat_shipping_fee", "79"),
        ("announcement", "Monsoon sale is live! Use WELCOME10 at checkout."),
    ];

    let now = Utc::now();
    let mut count = 0;

    for (key, value) in settings_data {
        let row = setting::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(now),
        };
        row.insert(db).await?;
        count += 1;
    }

    Ok(count)
}

async fn create_accounts(db: &sea_orm::DatabaseConnection) -> anyhow::Result<()> {
    // Only the password hasher is used here; the token secret is irrelevant
    let auth = AuthService::new(AuthConfig::new(
        "seed-only-secret".to_string(),
        StdDuration::from_secs(3600),
    ));
    let password_hash = auth
        .hash_password("hopz1234")
        .map_err(|e| anyhow::anyhow!("password hash failed: {e}"))?;

    let now = Utc::now();
    let accounts = vec![
        ("admin@happyhopz.com", "Store Admin", UserRole::Admin),
        ("demo@happyhopz.com", "Demo Customer", UserRole::Customer),
    ];

    for (email, full_name, role) in accounts {
        let account = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash.clone()),
            full_name: Set(full_name.to_string()),
            phone: Set(None),
            role: Set(role),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        account.insert(db).await?;
    }

    Ok(())
}
