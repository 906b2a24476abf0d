use crate::{
    config::AppConfig,
    entities::{
        cart_item, coupon, order,
        order::{OrderStatus, PaymentMethod, PaymentStatus},
        order_item, product_size, Address, CartItem, Coupon, Order, Product, ProductSize,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::cart::{CartService, CartSession},
    services::coupons::{normalize_code, quote_coupon, CouponService},
    services::payments::{PaymentHandoff, PaymentService},
};
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Checkout service: turns a cart into an order.
///
/// Everything the cart showed the shopper is re-derived inside one DB
/// transaction from live data: stock per size, current prices, the coupon's
/// applicability. Stock is decremented and the coupon's redemption counter
/// incremented in the same transaction, so a failed checkout leaves nothing
/// behind. The optional payment-gateway handoff happens after commit; a
/// gateway hiccup leaves a pending order the shopper can still pay for.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    cart_service: Arc<CartService>,
    payment_service: Arc<PaymentService>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        cart_service: Arc<CartService>,
        payment_service: Arc<PaymentService>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            cart_service,
            payment_service,
            event_sender,
            config,
        }
    }

    /// Places an order from the caller's cart.
    ///
    /// # Arguments
    ///
    /// * `session` - Cart ownership proof (session token and/or customer id)
    /// * `input` - Contact details, shipping address, payment method and an
    ///   optional coupon code overriding the one on the cart
    ///
    /// # Returns
    ///
    /// The created order with its lines, plus gateway handoff details when
    /// the shopper chose online payment.
    #[instrument(skip(self, input), fields(payment_method = %input.payment_method))]
    pub async fn place_order(
        &self,
        session: &CartSession,
        input: CheckoutInput,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let email = validate_email(&input.email)?;
        let phone = validate_phone(&input.phone)?;
        if input.payment_method == PaymentMethod::Online && !self.config.payments_enabled {
            return Err(ServiceError::ValidationError(
                "Online payments are not enabled".to_string(),
            ));
        }

        let shipping = self.resolve_shipping(session, &input).await?;

        let cart = match input.cart_id {
            Some(cart_id) => self.cart_service.authorized_cart(cart_id, session).await?,
            None => self.cart_service.require_cart(session).await?,
        };
        let cart_id = cart.id;

        let txn = self.db.begin().await?;

        let lines = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        // Re-derive every line from live catalog data and take the stock
        let mut subtotal = Decimal::ZERO;
        let mut gst_total = Decimal::ZERO;
        let mut snapshots = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = Product::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;
            if !product.is_active {
                return Err(ServiceError::ValidationError(format!(
                    "{} is no longer available",
                    product.name
                )));
            }
            let size = ProductSize::find_by_id(line.size_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Size for {} no longer exists", product.name))
                })?;
            if size.stock_qty < line.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Only {} left of {} in size {}",
                    size.stock_qty, product.name, size.size_label
                )));
            }

            let line_total = product.price * Decimal::from(line.quantity);
            subtotal += line_total;
            gst_total += extract_gst(line_total, product.gst_rate);

            let size_label = size.size_label.clone();
            let remaining = size.stock_qty - line.quantity;
            let mut size_active: product_size::ActiveModel = size.into();
            size_active.stock_qty = Set(remaining);
            size_active.update(&txn).await?;

            snapshots.push((product, size_label, line.quantity, line_total));
        }
        let gst_total = gst_total.round_dp(2);

        // The coupon in the request wins over the one already on the cart
        let code = input
            .coupon_code
            .as_deref()
            .or(cart.coupon_code.as_deref())
            .map(normalize_code);
        let (applied_coupon, discount_amount) = match code {
            Some(code) => {
                let coupon_row = Coupon::find()
                    .filter(coupon::Column::Code.eq(code.clone()))
                    .one(&txn)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", code)))?;
                let quote = quote_coupon(&coupon_row, subtotal, Utc::now())?;
                (Some(coupon_row), quote.discount_amount)
            }
            None => (None, Decimal::ZERO),
        };

        let shipping_amount = shipping_fee(
            subtotal - discount_amount,
            Decimal::from_f64_retain(self.config.free_shipping_threshold)
                .unwrap_or(Decimal::ZERO),
            Decimal::from_f64_retain(self.config.flat_shipping_fee).unwrap_or(Decimal::ZERO),
        );
        let total = subtotal - discount_amount + shipping_amount;

        // COD is confirmed immediately; online waits for the gateway
        let status = match input.payment_method {
            PaymentMethod::Cod => OrderStatus::Confirmed,
            PaymentMethod::Online => OrderStatus::Pending,
        };

        let mut order_number = generate_order_number();
        for _ in 0..2 {
            let taken = Order::find()
                .filter(order::Column::OrderNumber.eq(order_number.clone()))
                .one(&txn)
                .await?
                .is_some();
            if !taken {
                break;
            }
            order_number = generate_order_number();
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let coupon_code_applied = applied_coupon.as_ref().map(|c| c.code.clone());
        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number),
            customer_id: Set(session.customer_id),
            email: Set(email),
            phone: Set(phone),
            status: Set(status),
            payment_method: Set(input.payment_method),
            payment_status: Set(PaymentStatus::Pending),
            subtotal: Set(subtotal),
            discount_amount: Set(discount_amount),
            coupon_code: Set(coupon_code_applied),
            shipping_fee: Set(shipping_amount),
            gst_amount: Set(gst_total),
            total: Set(total),
            shipping_name: Set(shipping.name),
            shipping_line1: Set(shipping.line1),
            shipping_line2: Set(shipping.line2),
            shipping_city: Set(shipping.city),
            shipping_state: Set(shipping.state),
            shipping_postal_code: Set(shipping.postal_code),
            shipping_country: Set(shipping.country),
            notes: Set(input.notes),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order.insert(&txn).await?;

        let mut items = Vec::with_capacity(snapshots.len());
        for (product, size_label, quantity, line_total) in snapshots {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                product_name: Set(product.name),
                size_label: Set(size_label),
                sku: Set(product.sku),
                quantity: Set(quantity),
                unit_price: Set(product.price),
                line_total: Set(line_total),
            };
            items.push(item.insert(&txn).await?);
        }

        if let Some(coupon_row) = applied_coupon {
            CouponService::increment_usage(&txn, coupon_row).await?;
        }
        CartService::mark_converted(&txn, cart).await?;

        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;

        // Post-commit so a gateway failure never rolls the order back
        let payment = match input.payment_method {
            PaymentMethod::Online => Some(self.payment_service.create_gateway_order(&order).await?),
            PaymentMethod::Cod => None,
        };

        info!(
            "Order {} placed from cart {} ({} total)",
            order.order_number, cart_id, order.total
        );
        Ok(CheckoutOutcome {
            order,
            items,
            payment,
        })
    }

    /// Resolves the shipping address from the request: either an inline
    /// address or, for signed-in customers, a saved address id.
    async fn resolve_shipping(
        &self,
        session: &CartSession,
        input: &CheckoutInput,
    ) -> Result<ResolvedShipping, ServiceError> {
        if let Some(address_id) = input.address_id {
            let customer_id = session.customer_id.ok_or_else(|| {
                ServiceError::ValidationError(
                    "Sign in to ship to a saved address".to_string(),
                )
            })?;
            let saved = Address::find_by_id(address_id)
                .one(&*self.db)
                .await?
                .filter(|a| a.customer_id == customer_id)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Address {} not found", address_id))
                })?;
            return Ok(ResolvedShipping {
                name: saved.recipient_name,
                line1: saved.line1,
                line2: saved.line2,
                city: saved.city,
                state: saved.state,
                postal_code: saved.postal_code,
                country: saved.country,
            });
        }

        let inline = input.shipping_address.as_ref().ok_or_else(|| {
            ServiceError::ValidationError("Shipping address is required".to_string())
        })?;
        validate_shipping(inline)?;
        Ok(ResolvedShipping {
            name: inline.name.trim().to_string(),
            line1: inline.line1.trim().to_string(),
            line2: inline.line2.as_ref().map(|l| l.trim().to_string()),
            city: inline.city.trim().to_string(),
            state: inline.state.trim().to_string(),
            postal_code: inline.postal_code.trim().to_string(),
            country: inline.country.trim().to_uppercase(),
        })
    }
}

// ==================== Pricing ====================

/// Extracts the GST portion from a GST-inclusive amount:
/// `gross * rate / (100 + rate)`, rounded to paise.
pub fn extract_gst(gross: Decimal, rate_percent: Decimal) -> Decimal {
    if rate_percent <= Decimal::ZERO || gross <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (gross * rate_percent / (Decimal::from(100) + rate_percent)).round_dp(2)
}

/// Shipping on the discounted merchandise total: free at or above the
/// threshold, a flat fee below it, nothing on an empty total.
pub fn shipping_fee(discounted_subtotal: Decimal, free_threshold: Decimal, flat_fee: Decimal) -> Decimal {
    if discounted_subtotal <= Decimal::ZERO || discounted_subtotal >= free_threshold {
        Decimal::ZERO
    } else {
        flat_fee
    }
}

/// Order numbers look like `HH-7K2M9Q`: short enough to read out on a
/// support call, random enough to not be guessable in sequence.
pub fn generate_order_number() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("HH-{}", suffix)
}

// ==================== Input validation ====================

fn validate_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    if !validator::validate_email(&email) {
        return Err(ServiceError::ValidationError(format!(
            "{} is not a valid email address",
            email
        )));
    }
    Ok(email)
}

fn validate_phone(phone: &str) -> Result<String, ServiceError> {
    let phone = phone.trim().to_string();
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(10..=13).contains(&digits) {
        return Err(ServiceError::ValidationError(
            "Phone number must contain 10 to 13 digits".to_string(),
        ));
    }
    Ok(phone)
}

fn validate_shipping(address: &ShippingAddressInput) -> Result<(), ServiceError> {
    let required = [
        ("name", &address.name),
        ("line1", &address.line1),
        ("city", &address.city),
        ("state", &address.state),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Shipping address {} is required",
                field
            )));
        }
    }

    let pin = address.postal_code.trim();
    if address.country.trim().eq_ignore_ascii_case("IN") {
        if pin.len() != 6 || !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(ServiceError::ValidationError(
                "PIN code must be 6 digits".to_string(),
            ));
        }
    } else if pin.is_empty() {
        return Err(ServiceError::ValidationError(
            "Postal code is required".to_string(),
        ));
    }
    Ok(())
}

// ==================== Types ====================

/// Checkout request payload
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutInput {
    /// Explicit cart id; defaults to the caller's active cart
    pub cart_id: Option<Uuid>,
    pub email: String,
    pub phone: String,
    pub payment_method: PaymentMethod,
    pub shipping_address: Option<ShippingAddressInput>,
    /// Saved address id, signed-in customers only
    pub address_id: Option<Uuid>,
    /// Overrides the coupon already on the cart
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ShippingAddressInput {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "IN".to_string()
}

struct ResolvedShipping {
    name: String,
    line1: String,
    line2: Option<String>,
    city: String,
    state: String,
    postal_code: String,
    country: String,
}

/// Checkout result: the order, its lines, and the gateway handoff for
/// online payments.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutOutcome {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentHandoff>,
}
