use crate::{
    config::AppConfig,
    entities::{
        category, product,
        product::Gender,
        product_size, review,
        Category, Product, ProductSize, Review,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use url::form_urlencoded;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Catalog service for categories, products and their size/stock rows.
///
/// Products are soft-deleted (`is_active = false`) so historical order items
/// keep a valid product reference. Stock lives on `ProductSize`, the
/// purchasable unit; checkout decrements it inside its own transaction.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl CatalogService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    // ==================== Categories ====================

    pub async fn list_categories(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<category::Model>, ServiceError> {
        let mut query = Category::find();
        if !include_inactive {
            query = query.filter(category::Column::IsActive.eq(true));
        }
        Ok(query
            .order_by_asc(category::Column::DisplayOrder)
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn create_category(
        &self,
        input: CreateCategoryInput,
    ) -> Result<category::Model, ServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Category name cannot be empty".to_string(),
            ));
        }

        let slug = match input.slug {
            Some(slug) => slugify(&slug),
            None => slugify(&name),
        };
        if Category::find()
            .filter(category::Column::Slug.eq(slug.clone()))
            .one(&*self.db)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "Category slug {} already exists",
                slug
            )));
        }

        let now = Utc::now();
        let category = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            slug: Set(slug),
            description: Set(input.description),
            display_order: Set(input.display_order.unwrap_or(0)),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Ok(category.insert(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn update_category(
        &self,
        category_id: Uuid,
        input: UpdateCategoryInput,
    ) -> Result<category::Model, ServiceError> {
        let category = Category::find_by_id(category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Category {} not found", category_id))
            })?;

        let mut active: category::ActiveModel = category.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(slug) = input.slug {
            active.slug = Set(slugify(&slug));
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(display_order) = input.display_order {
            active.display_order = Set(display_order);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db).await?)
    }

    /// Deletes a category. Products keep their rows; the FK sets their
    /// category to NULL.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, category_id: Uuid) -> Result<(), ServiceError> {
        let result = Category::delete_by_id(category_id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Category {} not found",
                category_id
            )));
        }
        Ok(())
    }

    // ==================== Products ====================

    /// Lists products with storefront filters. Public callers only see
    /// active products; the admin list passes `include_inactive`.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let mut query = Product::find();

        if !filter.include_inactive {
            query = query.filter(product::Column::IsActive.eq(true));
        }
        if let Some(category_slug) = &filter.category {
            let category = Category::find()
                .filter(category::Column::Slug.eq(slugify(category_slug)))
                .one(&*self.db)
                .await?;
            match category {
                Some(category) => {
                    query = query.filter(product::Column::CategoryId.eq(category.id));
                }
                // Unknown category matches nothing rather than erroring
                None => return Ok((vec![], 0)),
            }
        }
        if let Some(gender) = filter.gender {
            query = query.filter(product::Column::Gender.eq(gender));
        }
        if let Some(search) = &filter.search {
            let term = search.trim();
            if !term.is_empty() {
                query = query.filter(
                    product::Column::Name
                        .contains(term)
                        .or(product::Column::Brand.contains(term))
                        .or(product::Column::Description.contains(term)),
                );
            }
        }
        if let Some(min_price) = filter.min_price {
            query = query.filter(product::Column::Price.gte(min_price));
        }
        if let Some(max_price) = filter.max_price {
            query = query.filter(product::Column::Price.lte(max_price));
        }
        if let Some(featured) = filter.featured {
            query = query.filter(product::Column::IsFeatured.eq(featured));
        }

        query = match filter.sort.unwrap_or_default() {
            ProductSort::PriceAsc => query.order_by_asc(product::Column::Price),
            ProductSort::PriceDesc => query.order_by_desc(product::Column::Price),
            ProductSort::Name => query.order_by_asc(product::Column::Name),
            ProductSort::Newest => query.order_by_desc(product::Column::CreatedAt),
        };

        let paginator = query.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((data, total))
    }

    /// Product detail for the storefront page: sizes with live stock, the
    /// category, the approved-review summary and outbound share links.
    #[instrument(skip(self))]
    pub async fn get_product_by_slug(&self, slug: &str) -> Result<ProductDetail, ServiceError> {
        let product = Product::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", slug)))?;

        self.build_detail(product).await
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    pub async fn get_product_detail(&self, product_id: Uuid) -> Result<ProductDetail, ServiceError> {
        let product = self.get_product(product_id).await?;
        self.build_detail(product).await
    }

    async fn build_detail(&self, product: product::Model) -> Result<ProductDetail, ServiceError> {
        let sizes = ProductSize::find()
            .filter(product_size::Column::ProductId.eq(product.id))
            .order_by_asc(product_size::Column::DisplayOrder)
            .all(&*self.db)
            .await?;

        let category = match product.category_id {
            Some(category_id) => Category::find_by_id(category_id).one(&*self.db).await?,
            None => None,
        };

        let approved = Review::find()
            .filter(review::Column::ProductId.eq(product.id))
            .filter(review::Column::IsApproved.eq(true))
            .all(&*self.db)
            .await?;
        let rating = RatingSummary::from_ratings(approved.iter().map(|r| r.rating));

        let share_urls = build_share_urls(&self.config.public_store_url, &product);

        Ok(ProductDetail {
            product,
            category,
            sizes,
            rating,
            share_urls,
        })
    }

    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Product name cannot be empty".to_string(),
            ));
        }
        if input.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price must be positive".to_string(),
            ));
        }
        if let Some(mrp) = input.mrp {
            if mrp < input.price {
                return Err(ServiceError::ValidationError(
                    "MRP cannot be below the selling price".to_string(),
                ));
            }
        }
        let gst_rate = match input.gst_rate {
            Some(rate) => rate,
            None => Decimal::from_f64_retain(self.config.default_gst_rate_percent)
                .unwrap_or(Decimal::ZERO),
        };
        if gst_rate < Decimal::ZERO || gst_rate > Decimal::from(100) {
            return Err(ServiceError::ValidationError(
                "GST rate must be between 0 and 100".to_string(),
            ));
        }

        let sku = input.sku.trim().to_uppercase();
        if Product::find()
            .filter(product::Column::Sku.eq(sku.clone()))
            .one(&*self.db)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!("SKU {} already exists", sku)));
        }

        let slug = self
            .unique_slug(&input.slug.unwrap_or_else(|| name.clone()), None)
            .await?;

        let txn = self.db.begin().await?;
        let now = Utc::now();
        let product_id = Uuid::new_v4();
        let product = product::ActiveModel {
            id: Set(product_id),
            name: Set(name),
            slug: Set(slug),
            description: Set(input.description),
            category_id: Set(input.category_id),
            brand: Set(input.brand),
            price: Set(input.price),
            mrp: Set(input.mrp),
            gst_rate: Set(gst_rate),
            sku: Set(sku),
            image_url: Set(input.image_url),
            gallery: Set(input
                .gallery
                .map(|urls| serde_json::json!(urls))),
            gender: Set(input.gender.unwrap_or(Gender::Unisex)),
            age_range: Set(input.age_range),
            is_active: Set(input.is_active.unwrap_or(true)),
            is_featured: Set(input.is_featured.unwrap_or(false)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let product = product.insert(&txn).await?;

        if let Some(sizes) = input.sizes {
            insert_sizes(&txn, product_id, &sizes).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;

        info!("Created product {} ({})", product.name, product.sku);
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        let product = self.get_product(product_id).await?;

        if let Some(price) = input.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price must be positive".to_string(),
                ));
            }
        }

        let new_slug = match &input.slug {
            Some(slug) => Some(self.unique_slug(slug, Some(product_id)).await?),
            None => None,
        };

        let mut active: product::ActiveModel = product.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(slug) = new_slug {
            active.slug = Set(slug);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(category_id) = input.category_id {
            active.category_id = Set(Some(category_id));
        }
        if let Some(brand) = input.brand {
            active.brand = Set(Some(brand));
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(mrp) = input.mrp {
            active.mrp = Set(Some(mrp));
        }
        if let Some(gst_rate) = input.gst_rate {
            active.gst_rate = Set(gst_rate);
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(Some(image_url));
        }
        if let Some(gallery) = input.gallery {
            active.gallery = Set(Some(serde_json::json!(gallery)));
        }
        if let Some(gender) = input.gender {
            active.gender = Set(gender);
        }
        if let Some(age_range) = input.age_range {
            active.age_range = Set(Some(age_range));
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(is_featured) = input.is_featured {
            active.is_featured = Set(is_featured);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;
        Ok(updated)
    }

    /// Soft-deletes a product so existing order lines keep their reference.
    #[instrument(skip(self))]
    pub async fn archive_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let product = self.get_product(product_id).await?;

        let mut active: product::ActiveModel = product.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductArchived(product_id))
            .await;
        Ok(())
    }

    /// Replaces a product's size set. Sizes whose label survives are updated
    /// in place so cart rows pointing at them stay valid; labels missing from
    /// the payload are removed.
    #[instrument(skip(self))]
    pub async fn replace_sizes(
        &self,
        product_id: Uuid,
        sizes: Vec<SizeInput>,
    ) -> Result<Vec<product_size::Model>, ServiceError> {
        self.get_product(product_id).await?;

        for size in &sizes {
            if size.size_label.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "Size label cannot be empty".to_string(),
                ));
            }
            if size.stock_qty < 0 {
                return Err(ServiceError::ValidationError(format!(
                    "Stock for size {} cannot be negative",
                    size.size_label
                )));
            }
        }

        let txn = self.db.begin().await?;

        let existing = ProductSize::find()
            .filter(product_size::Column::ProductId.eq(product_id))
            .all(&txn)
            .await?;
        let incoming_labels: HashSet<String> =
            sizes.iter().map(|s| s.size_label.trim().to_string()).collect();

        for row in &existing {
            if !incoming_labels.contains(&row.size_label) {
                ProductSize::delete_by_id(row.id).exec(&txn).await?;
            }
        }

        for (position, size) in sizes.iter().enumerate() {
            let label = size.size_label.trim().to_string();
            let display_order = size.display_order.unwrap_or(position as i32);
            match existing.iter().find(|row| row.size_label == label) {
                Some(row) => {
                    let mut active: product_size::ActiveModel = row.clone().into();
                    active.eu_size = Set(size.eu_size);
                    active.stock_qty = Set(size.stock_qty);
                    active.display_order = Set(display_order);
                    active.update(&txn).await?;
                }
                None => {
                    let row = product_size::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        product_id: Set(product_id),
                        size_label: Set(label),
                        eu_size: Set(size.eu_size),
                        stock_qty: Set(size.stock_qty),
                        display_order: Set(display_order),
                    };
                    row.insert(&txn).await?;
                }
            }
        }

        txn.commit().await?;

        let updated = ProductSize::find()
            .filter(product_size::Column::ProductId.eq(product_id))
            .order_by_asc(product_size::Column::DisplayOrder)
            .all(&*self.db)
            .await?;
        Ok(updated)
    }

    /// Picks the first free slug among `base`, `base-2`, `base-3`, ...
    async fn unique_slug(
        &self,
        candidate: &str,
        existing_product: Option<Uuid>,
    ) -> Result<String, ServiceError> {
        let base = slugify(candidate);
        if base.is_empty() {
            return Err(ServiceError::ValidationError(
                "Slug cannot be empty".to_string(),
            ));
        }

        let mut slug = base.clone();
        let mut suffix = 2u32;
        loop {
            let taken = Product::find()
                .filter(product::Column::Slug.eq(slug.clone()))
                .one(&*self.db)
                .await?;
            match taken {
                Some(other) if Some(other.id) != existing_product => {
                    slug = format!("{}-{}", base, suffix);
                    suffix += 1;
                }
                _ => return Ok(slug),
            }
        }
    }
}

async fn insert_sizes(
    conn: &impl sea_orm::ConnectionTrait,
    product_id: Uuid,
    sizes: &[SizeInput],
) -> Result<(), ServiceError> {
    for (position, size) in sizes.iter().enumerate() {
        let row = product_size::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            size_label: Set(size.size_label.trim().to_string()),
            eu_size: Set(size.eu_size),
            stock_qty: Set(size.stock_qty),
            display_order: Set(size.display_order.unwrap_or(position as i32)),
        };
        row.insert(conn).await?;
    }
    Ok(())
}

/// Lowercases and collapses everything outside [a-z0-9] into single hyphens.
pub fn slugify(input: &str) -> String {
    let lower = input.trim().to_lowercase();
    NON_SLUG_CHARS
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// Outbound share links for a product page, mirroring the storefront's
/// WhatsApp and Telegram share buttons.
pub fn build_share_urls(public_base_url: &str, product: &product::Model) -> ShareUrls {
    let product_url = format!(
        "{}/products/{}",
        public_base_url.trim_end_matches('/'),
        product.slug
    );
    let message = format!("Check out {} at {}", product.name, product_url);

    let whatsapp = format!("https://wa.me/?text={}", urlencode(&message));
    let telegram = format!(
        "https://t.me/share/url?url={}&text={}",
        urlencode(&product_url),
        urlencode(&product.name)
    );

    ShareUrls { whatsapp, telegram }
}

fn urlencode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Storefront product filters
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub gender: Option<Gender>,
    /// Free-text search, also accepted as `q`
    #[serde(alias = "q")]
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    pub sort: Option<ProductSort>,
    #[serde(skip)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    PriceAsc,
    PriceDesc,
    Name,
    #[default]
    Newest,
}

/// Input for creating a category
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// Input for updating a category
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// Input for creating a product
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand: Option<String>,
    pub price: Decimal,
    pub mrp: Option<Decimal>,
    pub gst_rate: Option<Decimal>,
    pub sku: String,
    pub image_url: Option<String>,
    pub gallery: Option<Vec<String>>,
    pub gender: Option<Gender>,
    pub age_range: Option<String>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub sizes: Option<Vec<SizeInput>>,
}

/// Input for updating a product
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand: Option<String>,
    pub price: Option<Decimal>,
    pub mrp: Option<Decimal>,
    pub gst_rate: Option<Decimal>,
    pub image_url: Option<String>,
    pub gallery: Option<Vec<String>>,
    pub gender: Option<Gender>,
    pub age_range: Option<String>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

/// One size row in a product payload
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SizeInput {
    pub size_label: String,
    pub eu_size: Option<i32>,
    pub stock_qty: i32,
    pub display_order: Option<i32>,
}

/// Approved-review aggregate shown on the product page
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RatingSummary {
    pub average: Option<Decimal>,
    pub count: u64,
}

impl RatingSummary {
    pub fn from_ratings(ratings: impl Iterator<Item = i32>) -> Self {
        let collected: Vec<i32> = ratings.collect();
        let count = collected.len() as u64;
        let average = if count == 0 {
            None
        } else {
            let sum: i32 = collected.iter().sum();
            Some((Decimal::from(sum) / Decimal::from(count)).round_dp(1))
        };
        Self { average, count }
    }
}

/// Product page payload
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: product::Model,
    pub category: Option<category::Model>,
    pub sizes: Vec<product_size::Model>,
    pub rating: RatingSummary,
    pub share_urls: ShareUrls,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShareUrls {
    pub whatsapp: String,
    pub telegram: String,
}
