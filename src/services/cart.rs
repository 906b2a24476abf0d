use crate::{
    config::AppConfig,
    entities::{
        cart,
        cart::CartStatus,
        cart_item, product_size, Cart, CartItem, Product, ProductSize,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::checkout::{extract_gst, shipping_fee},
    services::coupons::{expires_in_secs, quote_coupon, CouponService},
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Cart service for guest and signed-in shoppers.
///
/// A cart is addressed by id, but every operation also proves ownership: the
/// caller must present the cart's `session_token` (kept client-side and sent
/// as `X-Session-Token`) or be the customer the cart is bound to. Signing in
/// binds a guest cart to the customer so it follows them across devices.
/// Line prices are refreshed from the catalog and the attached coupon is
/// re-checked on every mutation; checkout repeats both checks inside its own
/// transaction.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    coupon_service: Arc<CouponService>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

/// Who is asking for a cart: the session token from `X-Session-Token`,
/// the authenticated customer id, or both.
#[derive(Debug, Clone, Default)]
pub struct CartSession {
    pub session_token: Option<String>,
    pub customer_id: Option<Uuid>,
}

impl CartSession {
    pub fn guest(token: impl Into<String>) -> Self {
        Self {
            session_token: Some(token.into()),
            customer_id: None,
        }
    }
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        coupon_service: Arc<CouponService>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            coupon_service,
            event_sender,
            config,
        }
    }

    /// Returns the caller's active cart, creating an empty one when none
    /// exists. The view echoes the session token so guests can persist it.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let view = cart_service
    ///     .get_or_create_cart(&CartSession::guest("3f2b..."))
    ///     .await?;
    /// println!("cart {} holds {} items", view.id, view.items.len());
    /// ```
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, session: &CartSession) -> Result<CartView, ServiceError> {
        let cart = match self.find_active(session).await? {
            Some(cart) => cart,
            None => self.create_cart(session.customer_id).await?,
        };
        self.build_view(cart).await
    }

    #[instrument(skip(self))]
    pub async fn get_cart(
        &self,
        cart_id: Uuid,
        session: &CartSession,
    ) -> Result<CartView, ServiceError> {
        let cart = self.authorized_cart(cart_id, session).await?;
        self.build_view(cart).await
    }

    /// Adds a size to the cart, merging into an existing line for the same
    /// size. Fails with an insufficient-stock error naming the size when the
    /// requested quantity exceeds what is left.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        cart_id: Uuid,
        session: &CartSession,
        input: AddItemInput,
    ) -> Result<CartView, ServiceError> {
        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let cart = self.authorized_cart(cart_id, session).await?;

        let product = Product::find_by_id(input.product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;
        let size = ProductSize::find_by_id(input.size_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Size {} not found", input.size_id)))?;
        if size.product_id != product.id {
            return Err(ServiceError::ValidationError(format!(
                "Size {} does not belong to product {}",
                size.size_label, product.name
            )));
        }

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::SizeId.eq(size.id))
            .one(&*self.db)
            .await?;
        let requested = existing.as_ref().map(|e| e.quantity).unwrap_or(0) + input.quantity;
        if requested > size.stock_qty {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} left of {} in size {}",
                size.stock_qty, product.name, size.size_label
            )));
        }

        let now = Utc::now();
        match existing {
            Some(line) => {
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(requested);
                active.unit_price = Set(product.price);
                active.line_total = Set(product.price * Decimal::from(requested));
                active.updated_at = Set(now);
                active.update(&*self.db).await?;
            }
            None => {
                let line = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product.id),
                    size_id: Set(size.id),
                    quantity: Set(input.quantity),
                    unit_price: Set(product.price),
                    line_total: Set(product.price * Decimal::from(input.quantity)),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                line.insert(&*self.db).await?;
            }
        }

        let cart = self.reprice_and_total(cart).await?;
        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id: product.id,
            })
            .await;
        self.build_view(cart).await
    }

    /// Sets a line's quantity. Zero or less removes the line.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        cart_id: Uuid,
        session: &CartSession,
        item_id: Uuid,
        input: UpdateItemInput,
    ) -> Result<CartView, ServiceError> {
        let cart = self.authorized_cart(cart_id, session).await?;
        let line = CartItem::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .filter(|line| line.cart_id == cart.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        if input.quantity <= 0 {
            line.delete(&*self.db).await?;
            let cart = self.reprice_and_total(cart).await?;
            self.event_sender
                .send_or_log(Event::CartItemRemoved {
                    cart_id: cart.id,
                    item_id,
                })
                .await;
            return self.build_view(cart).await;
        }

        let size = ProductSize::find_by_id(line.size_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Size {} no longer exists", line.size_id))
            })?;
        if input.quantity > size.stock_qty {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} left in size {}",
                size.stock_qty, size.size_label
            )));
        }

        let unit_price = line.unit_price;
        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(input.quantity);
        active.line_total = Set(unit_price * Decimal::from(input.quantity));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        let cart = self.reprice_and_total(cart).await?;
        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: cart.id,
                item_id,
            })
            .await;
        self.build_view(cart).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        cart_id: Uuid,
        session: &CartSession,
        item_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let cart = self.authorized_cart(cart_id, session).await?;
        let line = CartItem::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .filter(|line| line.cart_id == cart.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        line.delete(&*self.db).await?;

        let cart = self.reprice_and_total(cart).await?;
        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                item_id,
            })
            .await;
        self.build_view(cart).await
    }

    /// Empties the cart and detaches any coupon.
    #[instrument(skip(self))]
    pub async fn clear_cart(
        &self,
        cart_id: Uuid,
        session: &CartSession,
    ) -> Result<CartView, ServiceError> {
        let cart = self.authorized_cart(cart_id, session).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;

        let mut active: cart::ActiveModel = cart.into();
        active.subtotal = Set(Decimal::ZERO);
        active.discount_amount = Set(Decimal::ZERO);
        active.coupon_code = Set(None);
        active.total = Set(Decimal::ZERO);
        active.updated_at = Set(Utc::now());
        let cart = active.update(&*self.db).await?;

        self.event_sender.send_or_log(Event::CartCleared(cart_id)).await;
        self.build_view(cart).await
    }

    /// Applies a coupon to a non-empty cart. The discount is recomputed from
    /// the live subtotal; the returned view carries the expiry countdown.
    #[instrument(skip(self))]
    pub async fn apply_coupon(
        &self,
        cart_id: Uuid,
        session: &CartSession,
        code: &str,
    ) -> Result<CartView, ServiceError> {
        let cart = self.authorized_cart(cart_id, session).await?;

        let has_items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&*self.db)
            .await?
            .is_some();
        if !has_items {
            return Err(ServiceError::ValidationError(
                "Cannot apply a coupon to an empty cart".to_string(),
            ));
        }

        // Reprice first so the coupon is judged against current prices
        let cart = self.reprice_and_total(cart).await?;
        let quote = self
            .coupon_service
            .validate_for_subtotal(code, cart.subtotal)
            .await?;

        let applied_code = quote.code.clone();
        let subtotal = cart.subtotal;
        let mut active: cart::ActiveModel = cart.into();
        active.coupon_code = Set(Some(quote.code));
        active.discount_amount = Set(quote.discount_amount);
        active.total = Set(subtotal - quote.discount_amount);
        active.updated_at = Set(Utc::now());
        let cart = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CouponApplied {
                cart_id: cart.id,
                code: applied_code,
            })
            .await;
        self.build_view(cart).await
    }

    #[instrument(skip(self))]
    pub async fn remove_coupon(
        &self,
        cart_id: Uuid,
        session: &CartSession,
    ) -> Result<CartView, ServiceError> {
        let cart = self.authorized_cart(cart_id, session).await?;

        let subtotal = cart.subtotal;
        let mut active: cart::ActiveModel = cart.into();
        active.coupon_code = Set(None);
        active.discount_amount = Set(Decimal::ZERO);
        active.total = Set(subtotal);
        active.updated_at = Set(Utc::now());
        let cart = active.update(&*self.db).await?;

        self.build_view(cart).await
    }

    /// Loads a cart by id and proves the caller may touch it. Unknown ids,
    /// expired carts and carts owned by someone else all come back as
    /// not-found so tokens cannot be probed.
    pub(crate) async fn authorized_cart(
        &self,
        cart_id: Uuid,
        session: &CartSession,
    ) -> Result<cart::Model, ServiceError> {
        let cart = Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        if cart.status != CartStatus::Active || cart.expires_at <= Utc::now() {
            return Err(ServiceError::NotFound(format!("Cart {} not found", cart_id)));
        }

        let token_ok = session
            .session_token
            .as_deref()
            .map(|token| token == cart.session_token)
            .unwrap_or(false);
        let allowed = match cart.customer_id {
            Some(owner) => session.customer_id == Some(owner),
            None => token_ok,
        };
        if !allowed {
            return Err(ServiceError::NotFound(format!("Cart {} not found", cart_id)));
        }

        self.bind_customer(cart, session.customer_id).await
    }

    /// Looks up the caller's active cart without creating one. Checkout uses
    /// this when no cart id is given.
    pub async fn require_cart(&self, session: &CartSession) -> Result<cart::Model, ServiceError> {
        self.find_active(session)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))
    }

    /// Marks a cart as converted once checkout has turned it into an order.
    /// Runs on the checkout transaction.
    pub async fn mark_converted(
        conn: &impl ConnectionTrait,
        cart: cart::Model,
    ) -> Result<(), ServiceError> {
        let mut active: cart::ActiveModel = cart.into();
        active.status = Set(CartStatus::Converted);
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;
        Ok(())
    }

    // ==================== Internals ====================

    async fn create_cart(&self, customer_id: Option<Uuid>) -> Result<cart::Model, ServiceError> {
        let now = Utc::now();
        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            session_token: Set(Uuid::new_v4().to_string()),
            status: Set(CartStatus::Active),
            subtotal: Set(Decimal::ZERO),
            discount_amount: Set(Decimal::ZERO),
            coupon_code: Set(None),
            total: Set(Decimal::ZERO),
            expires_at: Set(now + Duration::days(self.config.cart_expiry_days)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let cart = cart.insert(&*self.db).await?;

        self.event_sender.send_or_log(Event::CartCreated(cart.id)).await;
        Ok(cart)
    }

    /// Resolves the active cart for a session, expiring stale ones lazily.
    async fn find_active(&self, session: &CartSession) -> Result<Option<cart::Model>, ServiceError> {
        let now = Utc::now();

        if let Some(token) = &session.session_token {
            let found = Cart::find()
                .filter(cart::Column::SessionToken.eq(token.clone()))
                .filter(cart::Column::Status.eq(CartStatus::Active))
                .one(&*self.db)
                .await?;
            if let Some(cart) = found {
                if cart.expires_at <= now {
                    info!("Cart {} expired, abandoning", cart.id);
                    let mut stale: cart::ActiveModel = cart.into();
                    stale.status = Set(CartStatus::Abandoned);
                    stale.updated_at = Set(now);
                    stale.update(&*self.db).await?;
                } else {
                    let owner_ok = match (cart.customer_id, session.customer_id) {
                        (Some(owner), signed_in) => signed_in == Some(owner),
                        (None, _) => true,
                    };
                    if owner_ok {
                        return Ok(Some(self.bind_customer(cart, session.customer_id).await?));
                    }
                }
            }
        }

        if let Some(customer_id) = session.customer_id {
            let found = Cart::find()
                .filter(cart::Column::CustomerId.eq(customer_id))
                .filter(cart::Column::Status.eq(CartStatus::Active))
                .filter(cart::Column::ExpiresAt.gt(now))
                .order_by_desc(cart::Column::UpdatedAt)
                .one(&*self.db)
                .await?;
            if found.is_some() {
                return Ok(found);
            }
        }

        Ok(None)
    }

    /// Attaches a guest cart to the customer who just signed in.
    async fn bind_customer(
        &self,
        cart: cart::Model,
        customer_id: Option<Uuid>,
    ) -> Result<cart::Model, ServiceError> {
        match customer_id {
            Some(customer_id) if cart.customer_id.is_none() => {
                let mut active: cart::ActiveModel = cart.into();
                active.customer_id = Set(Some(customer_id));
                active.updated_at = Set(Utc::now());
                Ok(active.update(&*self.db).await?)
            }
            _ => Ok(cart),
        }
    }

    /// Refreshes line prices from the catalog, recomputes the subtotal and
    /// re-checks the attached coupon, dropping it when it no longer applies.
    /// Also slides the expiry window forward.
    async fn reprice_and_total(&self, cart: cart::Model) -> Result<cart::Model, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let now = Utc::now();
        let mut subtotal = Decimal::ZERO;
        for (line, product) in rows {
            let line_total = match product {
                Some(product) if product.price != line.unit_price => {
                    let fresh = product.price * Decimal::from(line.quantity);
                    let mut active: cart_item::ActiveModel = line.into();
                    active.unit_price = Set(product.price);
                    active.line_total = Set(fresh);
                    active.updated_at = Set(now);
                    active.update(&*self.db).await?;
                    fresh
                }
                _ => line.line_total,
            };
            subtotal += line_total;
        }

        let (coupon_code, discount) = match &cart.coupon_code {
            Some(code) => match self.coupon_service.find_by_code(code).await? {
                Some(coupon) => match quote_coupon(&coupon, subtotal, now) {
                    Ok(quote) => (Some(code.clone()), quote.discount_amount),
                    Err(_) => {
                        info!("Coupon {} no longer applies, removing from cart", code);
                        (None, Decimal::ZERO)
                    }
                },
                None => (None, Decimal::ZERO),
            },
            None => (None, Decimal::ZERO),
        };

        let mut active: cart::ActiveModel = cart.into();
        active.subtotal = Set(subtotal);
        active.coupon_code = Set(coupon_code);
        active.discount_amount = Set(discount);
        active.total = Set(subtotal - discount);
        active.expires_at = Set(now + Duration::days(self.config.cart_expiry_days));
        active.updated_at = Set(now);
        Ok(active.update(&*self.db).await?)
    }

    async fn build_view(&self, cart: cart::Model) -> Result<CartView, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let size_ids: Vec<Uuid> = rows.iter().map(|(line, _)| line.size_id).collect();
        let sizes: HashMap<Uuid, product_size::Model> = ProductSize::find()
            .filter(product_size::Column::Id.is_in(size_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|size| (size.id, size))
            .collect();

        let default_rate = Decimal::from_f64_retain(self.config.default_gst_rate_percent)
            .unwrap_or(Decimal::ZERO);
        let mut items = Vec::with_capacity(rows.len());
        let mut gst_lines = Vec::with_capacity(rows.len());
        for (line, product) in rows {
            let size = sizes.get(&line.size_id);
            let available_qty = size.map(|s| s.stock_qty).unwrap_or(0);
            let gst_rate = product.as_ref().map(|p| p.gst_rate).unwrap_or(default_rate);
            gst_lines.push((line.line_total, gst_rate));
            items.push(CartItemView {
                id: line.id,
                product_id: line.product_id,
                size_id: line.size_id,
                product_name: product.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
                product_slug: product.as_ref().map(|p| p.slug.clone()).unwrap_or_default(),
                image_url: product.as_ref().and_then(|p| p.image_url.clone()),
                size_label: size.map(|s| s.size_label.clone()).unwrap_or_default(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                line_total: line.line_total,
                available_qty,
                in_stock: available_qty >= line.quantity,
            });
        }

        let totals = summarize_totals(
            &gst_lines,
            cart.discount_amount,
            self.threshold(),
            self.flat_fee(),
        );

        let coupon = match &cart.coupon_code {
            Some(code) => {
                let countdown = self
                    .coupon_service
                    .find_by_code(code)
                    .await?
                    .and_then(|row| expires_in_secs(&row, Utc::now()));
                Some(AppliedCoupon {
                    code: code.clone(),
                    discount_amount: cart.discount_amount,
                    expires_in_secs: countdown,
                })
            }
            None => None,
        };

        Ok(CartView {
            id: cart.id,
            session_token: cart.session_token,
            status: cart.status,
            items,
            coupon,
            totals,
            expires_at: cart.expires_at,
        })
    }

    fn threshold(&self) -> Decimal {
        Decimal::from_f64_retain(self.config.free_shipping_threshold).unwrap_or(Decimal::ZERO)
    }

    fn flat_fee(&self) -> Decimal {
        Decimal::from_f64_retain(self.config.flat_shipping_fee).unwrap_or(Decimal::ZERO)
    }
}

/// Computes the display totals for a set of `(line_total, gst_rate)` pairs.
/// GST is informational (prices already include it); shipping is judged on
/// the discounted subtotal.
pub(crate) fn summarize_totals(
    lines: &[(Decimal, Decimal)],
    discount_amount: Decimal,
    free_threshold: Decimal,
    flat_fee: Decimal,
) -> CartTotals {
    let subtotal: Decimal = lines.iter().map(|(total, _)| *total).sum();
    let discount = discount_amount.min(subtotal);
    let discounted = subtotal - discount;
    let shipping = shipping_fee(discounted, free_threshold, flat_fee);
    let gst_amount = lines
        .iter()
        .map(|(total, rate)| extract_gst(*total, *rate))
        .sum::<Decimal>()
        .round_dp(2);

    CartTotals {
        subtotal,
        discount_amount: discount,
        shipping_fee: shipping,
        gst_amount,
        total: discounted + shipping,
    }
}

/// Input for adding an item to the cart
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddItemInput {
    pub product_id: Uuid,
    pub size_id: Uuid,
    pub quantity: i32,
}

/// Input for changing a line's quantity
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateItemInput {
    pub quantity: i32,
}

/// Cart payload returned to the storefront
#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub id: Uuid,
    /// Echoed so guests can persist it client-side
    pub session_token: String,
    pub status: CartStatus,
    pub items: Vec<CartItemView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<AppliedCoupon>,
    pub totals: CartTotals,
    pub expires_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub size_id: Uuid,
    pub product_name: String,
    pub product_slug: String,
    pub image_url: Option<String>,
    pub size_label: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub available_qty: i32,
    pub in_stock: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub shipping_fee: Decimal,
    /// GST already included in `total`, shown for the tax breakup line
    pub gst_amount: Decimal,
    pub total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // ==================== Totals ====================

    #[test]
    fn empty_cart_has_zero_totals_and_no_shipping() {
        let totals = summarize_totals(&[], Decimal::ZERO, dec!(999), dec!(79));
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.shipping_fee, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn small_order_pays_flat_shipping() {
        let totals = summarize_totals(&[(dec!(899), dec!(12))], Decimal::ZERO, dec!(999), dec!(79));
        assert_eq!(totals.shipping_fee, dec!(79));
        assert_eq!(totals.total, dec!(978));
    }

    #[test]
    fn order_at_threshold_ships_free() {
        let totals = summarize_totals(&[(dec!(999), dec!(12))], Decimal::ZERO, dec!(999), dec!(79));
        assert_eq!(totals.shipping_fee, Decimal::ZERO);
        assert_eq!(totals.total, dec!(999));
    }

    #[test]
    fn discount_can_push_order_below_free_shipping() {
        // 1099 gross, 200 off -> 899 merchandise, so the flat fee applies
        let totals = summarize_totals(&[(dec!(1099), dec!(12))], dec!(200), dec!(999), dec!(79));
        assert_eq!(totals.discount_amount, dec!(200));
        assert_eq!(totals.shipping_fee, dec!(79));
        assert_eq!(totals.total, dec!(978));
    }

    #[test]
    fn discount_never_exceeds_subtotal() {
        let totals = summarize_totals(&[(dec!(299), dec!(12))], dec!(500), dec!(999), dec!(79));
        assert_eq!(totals.discount_amount, dec!(299));
        assert_eq!(totals.total, dec!(79));
    }

    #[test]
    fn gst_breakup_sums_per_line_rates() {
        // 899 at 12% -> 96.32, 1200 at 18% -> 183.05
        let totals = summarize_totals(
            &[(dec!(899), dec!(12)), (dec!(1200), dec!(18))],
            Decimal::ZERO,
            dec!(999),
            dec!(79),
        );
        assert_eq!(totals.gst_amount, dec!(279.37));
    }

    // ==================== Session Resolution ====================

    #[test]
    fn guest_session_has_no_customer() {
        let session = CartSession::guest("token-1");
        assert_eq!(session.session_token.as_deref(), Some("token-1"));
        assert!(session.customer_id.is_none());
    }
}
