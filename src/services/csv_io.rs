use crate::{
    entities::{category, order, order_item, product, Category, Order, OrderItem, Product},
    errors::ServiceError,
    services::catalog::{
        CatalogService, CreateCategoryInput, CreateProductInput, SizeInput, UpdateProductInput,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::Gender;

/// Admin bulk tooling: product CSV import (upsert by SKU) and order CSV
/// export for back-office spreadsheets.
///
/// Import is forgiving about headers: `Product Name`, `product_name` and
/// `name` all map to the same column, and each data row validates on its
/// own so one bad row never sinks the batch.
#[derive(Clone)]
pub struct CsvService {
    db: Arc<DatabaseConnection>,
    catalog: Arc<CatalogService>,
}

/// Canonical import columns after header normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Sku,
    Name,
    Description,
    Brand,
    Category,
    Price,
    Mrp,
    GstRate,
    Gender,
    AgeRange,
    ImageUrl,
    Sizes,
    Featured,
    Active,
}

impl CsvService {
    pub fn new(db: Arc<DatabaseConnection>, catalog: Arc<CatalogService>) -> Self {
        Self { db, catalog }
    }

    /// Upserts products from a CSV document keyed by SKU. Returns counts
    /// plus per-row errors (1-based row numbers counting the header).
    #[instrument(skip(self, data))]
    pub async fn import_products(&self, data: &[u8]) -> Result<ProductImportReport, ServiceError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(data);
        let headers = reader
            .headers()
            .map_err(|e| ServiceError::CsvError(format!("Unreadable CSV header: {}", e)))?
            .clone();

        let columns = map_headers(&headers);
        if !columns.values().any(|f| *f == Field::Sku) {
            return Err(ServiceError::CsvError(
                "CSV must include a 'sku' column".to_string(),
            ));
        }

        let mut report = ProductImportReport::default();
        for (idx, record) in reader.records().enumerate() {
            // Header occupies row 1, first data row is 2.
            let row_number = idx + 2;
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    report.errors.push(RowError {
                        row: row_number,
                        message: format!("Unparseable row: {}", e),
                    });
                    continue;
                }
            };

            match self.import_row(&columns, &record).await {
                Ok(RowOutcome::Created) => report.created += 1,
                Ok(RowOutcome::Updated) => report.updated += 1,
                Err(e) => report.errors.push(RowError {
                    row: row_number,
                    message: e.response_message(),
                }),
            }
        }

        info!(
            "Product import finished: {} created, {} updated, {} errors",
            report.created,
            report.updated,
            report.errors.len()
        );
        Ok(report)
    }

    async fn import_row(
        &self,
        columns: &HashMap<usize, Field>,
        record: &csv::StringRecord,
    ) -> Result<RowOutcome, ServiceError> {
        let row = RowData::parse(columns, record)?;
        let sku = row
            .sku
            .clone()
            .ok_or_else(|| ServiceError::ValidationError("Missing SKU".to_string()))?;

        let category_id = match row.category.as_deref() {
            Some(slug) => Some(self.resolve_category(slug).await?),
            None => None,
        };

        let existing = Product::find()
            .filter(product::Column::Sku.eq(sku.trim().to_uppercase()))
            .one(&*self.db)
            .await?;

        match existing {
            Some(product) => {
                let update = UpdateProductInput {
                    name: row.name,
                    description: row.description,
                    category_id,
                    brand: row.brand,
                    price: row.price,
                    mrp: row.mrp,
                    gst_rate: row.gst_rate,
                    gender: row.gender,
                    age_range: row.age_range,
                    image_url: row.image_url,
                    is_active: row.active,
                    is_featured: row.featured,
                    ..Default::default()
                };
                self.catalog.update_product(product.id, update).await?;
                if let Some(sizes) = row.sizes {
                    self.catalog.replace_sizes(product.id, sizes).await?;
                }
                Ok(RowOutcome::Updated)
            }
            None => {
                let name = row.name.ok_or_else(|| {
                    ServiceError::ValidationError("New products need a name".to_string())
                })?;
                let price = row.price.ok_or_else(|| {
                    ServiceError::ValidationError("New products need a price".to_string())
                })?;
                let create = CreateProductInput {
                    name,
                    slug: None,
                    description: row.description,
                    category_id,
                    brand: row.brand,
                    price,
                    mrp: row.mrp,
                    gst_rate: row.gst_rate,
                    sku,
                    image_url: row.image_url,
                    gallery: None,
                    gender: row.gender,
                    age_range: row.age_range,
                    is_active: row.active,
                    is_featured: row.featured,
                    sizes: row.sizes,
                };
                self.catalog.create_product(create).await?;
                Ok(RowOutcome::Created)
            }
        }
    }

    /// Finds the category by slug, creating it on the fly so a spreadsheet
    /// can introduce new categories without a separate pass.
    async fn resolve_category(&self, slug: &str) -> Result<Uuid, ServiceError> {
        let slug = slug.trim().to_lowercase().replace(' ', "-");
        if let Some(existing) = Category::find()
            .filter(category::Column::Slug.eq(slug.clone()))
            .one(&*self.db)
            .await?
        {
            return Ok(existing.id);
        }

        let created = self
            .catalog
            .create_category(CreateCategoryInput {
                name: title_case(&slug),
                slug: Some(slug),
                description: None,
                display_order: None,
                is_active: Some(true),
            })
            .await?;
        Ok(created.id)
    }

    /// Orders in the window as CSV text, one row per order item. The header
    /// row is always present so an empty window still opens in a spreadsheet.
    #[instrument(skip(self))]
    pub async fn export_orders(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<String, ServiceError> {
        let mut query = Order::find();
        if let Some(from) = from {
            query = query.filter(order::Column::CreatedAt.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(order::Column::CreatedAt.lte(to));
        }
        let orders = query
            .order_by_asc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(&*self.db)
            .await?;
        let mut by_order: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer
            .write_record(OrderExportRow::HEADERS)
            .map_err(|e| ServiceError::CsvError(e.to_string()))?;
        for order in &orders {
            for item in by_order.get(&order.id).into_iter().flatten() {
                writer
                    .serialize(OrderExportRow::new(order, item))
                    .map_err(|e| ServiceError::CsvError(e.to_string()))?;
            }
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ServiceError::CsvError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ServiceError::CsvError(e.to_string()))
    }
}

/// Maps each column index to the field it feeds, dropping unknown columns.
fn map_headers(headers: &csv::StringRecord) -> HashMap<usize, Field> {
    let mut columns = HashMap::new();
    for (idx, raw) in headers.iter().enumerate() {
        if let Some(field) = match_header(raw) {
            columns.entry(idx).or_insert(field);
        }
    }
    columns
}

fn match_header(raw: &str) -> Option<Field> {
    match normalize_header(raw).as_str() {
        "sku" | "productsku" | "skucode" | "itemcode" => Some(Field::Sku),
        "name" | "productname" | "title" => Some(Field::Name),
        "description" | "desc" => Some(Field::Description),
        "brand" => Some(Field::Brand),
        "category" | "categoryslug" => Some(Field::Category),
        "price" | "sellingprice" | "saleprice" => Some(Field::Price),
        "mrp" | "listprice" => Some(Field::Mrp),
        "gst" | "gstrate" | "tax" | "taxrate" => Some(Field::GstRate),
        "gender" => Some(Field::Gender),
        "age" | "agerange" => Some(Field::AgeRange),
        "image" | "imageurl" => Some(Field::ImageUrl),
        "sizes" | "sizestock" => Some(Field::Sizes),
        "featured" | "isfeatured" => Some(Field::Featured),
        "active" | "isactive" => Some(Field::Active),
        _ => None,
    }
}

/// Lowercases and strips everything but letters and digits, so
/// "Product Name", "product_name" and "Product-Name" collide on purpose.
fn normalize_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug, Default)]
struct RowData {
    sku: Option<String>,
    name: Option<String>,
    description: Option<String>,
    brand: Option<String>,
    category: Option<String>,
    price: Option<Decimal>,
    mrp: Option<Decimal>,
    gst_rate: Option<Decimal>,
    gender: Option<Gender>,
    age_range: Option<String>,
    image_url: Option<String>,
    sizes: Option<Vec<SizeInput>>,
    featured: Option<bool>,
    active: Option<bool>,
}

impl RowData {
    fn parse(
        columns: &HashMap<usize, Field>,
        record: &csv::StringRecord,
    ) -> Result<Self, ServiceError> {
        let mut row = RowData::default();
        for (idx, field) in columns {
            let Some(value) = record.get(*idx) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match field {
                Field::Sku => row.sku = Some(value.to_string()),
                Field::Name => row.name = Some(value.to_string()),
                Field::Description => row.description = Some(value.to_string()),
                Field::Brand => row.brand = Some(value.to_string()),
                Field::Category => row.category = Some(value.to_string()),
                Field::Price => row.price = Some(parse_decimal(value)?),
                Field::Mrp => row.mrp = Some(parse_decimal(value)?),
                Field::GstRate => row.gst_rate = Some(parse_decimal(value)?),
                Field::Gender => row.gender = Some(parse_gender(value)?),
                Field::AgeRange => row.age_range = Some(value.to_string()),
                Field::ImageUrl => row.image_url = Some(value.to_string()),
                Field::Sizes => row.sizes = Some(parse_size_specs(value)?),
                Field::Featured => row.featured = Some(parse_bool(value)?),
                Field::Active => row.active = Some(parse_bool(value)?),
            }
        }
        Ok(row)
    }
}

/// Accepts spreadsheet-flavored numbers: thousands separators and a
/// currency prefix.
fn parse_decimal(value: &str) -> Result<Decimal, ServiceError> {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned
        .parse::<Decimal>()
        .map_err(|_| ServiceError::ValidationError(format!("Not a number: {}", value)))
}

fn parse_gender(value: &str) -> Result<Gender, ServiceError> {
    match value.to_lowercase().as_str() {
        "boys" | "boy" => Ok(Gender::Boys),
        "girls" | "girl" => Ok(Gender::Girls),
        "unisex" => Ok(Gender::Unisex),
        other => Err(ServiceError::ValidationError(format!(
            "Unknown gender: {}",
            other
        ))),
    }
}

fn parse_bool(value: &str) -> Result<bool, ServiceError> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        other => Err(ServiceError::ValidationError(format!(
            "Not a yes/no value: {}",
            other
        ))),
    }
}

/// Parses the `label:eu:qty|label:eu:qty` size column. The EU size may be
/// blank (`UK 7K::10`) or omitted entirely (`UK 7K:10`).
fn parse_size_specs(value: &str) -> Result<Vec<SizeInput>, ServiceError> {
    let mut sizes = Vec::new();
    for (position, spec) in value.split('|').enumerate() {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }
        let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
        let (label, eu_raw, qty_raw) = match parts.as_slice() {
            [label, qty] => (*label, "", *qty),
            [label, eu, qty] => (*label, *eu, *qty),
            _ => {
                return Err(ServiceError::ValidationError(format!(
                    "Bad size spec: {}",
                    spec
                )))
            }
        };
        if label.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Size label missing in: {}",
                spec
            )));
        }
        let eu_size = if eu_raw.is_empty() {
            None
        } else {
            Some(eu_raw.parse::<i32>().map_err(|_| {
                ServiceError::ValidationError(format!("Bad EU size in: {}", spec))
            })?)
        };
        let stock_qty = qty_raw.parse::<i32>().map_err(|_| {
            ServiceError::ValidationError(format!("Bad quantity in: {}", spec))
        })?;
        if stock_qty < 0 {
            return Err(ServiceError::ValidationError(format!(
                "Negative quantity in: {}",
                spec
            )));
        }
        sizes.push(SizeInput {
            size_label: label.to_string(),
            eu_size,
            stock_qty,
            display_order: Some(position as i32),
        });
    }
    if sizes.is_empty() {
        return Err(ServiceError::ValidationError(
            "Size column is empty".to_string(),
        ));
    }
    Ok(sizes)
}

fn title_case(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

enum RowOutcome {
    Created,
    Updated,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ProductImportReport {
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

/// One exported line: the order columns repeat for every item row.
#[derive(Debug, Serialize)]
struct OrderExportRow<'a> {
    order_number: &'a str,
    placed_at: String,
    status: String,
    payment_method: String,
    payment_status: String,
    email: &'a str,
    phone: &'a str,
    shipping_name: &'a str,
    shipping_city: &'a str,
    shipping_state: &'a str,
    shipping_postal_code: &'a str,
    coupon_code: &'a str,
    product_name: &'a str,
    sku: &'a str,
    size_label: &'a str,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
    order_subtotal: Decimal,
    order_discount: Decimal,
    order_shipping_fee: Decimal,
    order_gst: Decimal,
    order_total: Decimal,
}

impl<'a> OrderExportRow<'a> {
    const HEADERS: &'static [&'static str] = &[
        "order_number",
        "placed_at",
        "status",
        "payment_method",
        "payment_status",
        "email",
        "phone",
        "shipping_name",
        "shipping_city",
        "shipping_state",
        "shipping_postal_code",
        "coupon_code",
        "product_name",
        "sku",
        "size_label",
        "quantity",
        "unit_price",
        "line_total",
        "order_subtotal",
        "order_discount",
        "order_shipping_fee",
        "order_gst",
        "order_total",
    ];

    fn new(order: &'a order::Model, item: &'a order_item::Model) -> Self {
        Self {
            order_number: &order.order_number,
            placed_at: order.created_at.to_rfc3339(),
            status: order.status.to_string(),
            payment_method: order.payment_method.to_string(),
            payment_status: order.payment_status.to_string(),
            email: &order.email,
            phone: &order.phone,
            shipping_name: &order.shipping_name,
            shipping_city: &order.shipping_city,
            shipping_state: &order.shipping_state,
            shipping_postal_code: &order.shipping_postal_code,
            coupon_code: order.coupon_code.as_deref().unwrap_or(""),
            product_name: &item.product_name,
            sku: &item.sku,
            size_label: &item.size_label,
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.line_total,
            order_subtotal: order.subtotal,
            order_discount: order.discount_amount,
            order_shipping_fee: order.shipping_fee,
            order_gst: order.gst_amount,
            order_total: order.total,
        }
    }
}
