use crate::{
    entities::coupon::{self, CouponType},
    entities::Coupon,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Coupon service for discount codes.
///
/// Owns the applicability rules (active window, usage cap, minimum order) and
/// the discount arithmetic shared by cart preview and checkout. Checkout
/// re-runs the same checks inside its transaction before burning a use.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a coupon. Codes are normalized to uppercase and must be unique.
    #[instrument(skip(self))]
    pub async fn create_coupon(
        &self,
        input: CreateCouponInput,
    ) -> Result<coupon::Model, ServiceError> {
        let code = normalize_code(&input.code);
        if code.is_empty() {
            return Err(ServiceError::ValidationError(
                "Coupon code cannot be empty".to_string(),
            ));
        }
        validate_discount(input.discount_type, input.discount_value)?;

        if self.find_by_code(&code).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Coupon code {} already exists",
                code
            )));
        }

        let now = Utc::now();
        let coupon = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.clone()),
            description: Set(input.description),
            discount_type: Set(input.discount_type),
            discount_value: Set(input.discount_value),
            min_order_amount: Set(input.min_order_amount.unwrap_or(Decimal::ZERO)),
            max_discount_amount: Set(input.max_discount_amount),
            max_uses: Set(input.max_uses),
            used_count: Set(0),
            valid_from: Set(input.valid_from.unwrap_or(now)),
            valid_until: Set(input.valid_until),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let coupon = coupon.insert(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::CouponCreated {
                coupon_id: coupon.id,
                code,
            })
            .await;
        info!("Created coupon {}", coupon.code);
        Ok(coupon)
    }

    #[instrument(skip(self))]
    pub async fn update_coupon(
        &self,
        coupon_id: Uuid,
        input: UpdateCouponInput,
    ) -> Result<coupon::Model, ServiceError> {
        let coupon = Coupon::find_by_id(coupon_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", coupon_id)))?;

        let discount_type = input.discount_type.unwrap_or(coupon.discount_type);
        let discount_value = input.discount_value.unwrap_or(coupon.discount_value);
        validate_discount(discount_type, discount_value)?;

        let mut active: coupon::ActiveModel = coupon.into();
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        active.discount_type = Set(discount_type);
        active.discount_value = Set(discount_value);
        if let Some(min_order) = input.min_order_amount {
            active.min_order_amount = Set(min_order);
        }
        if let Some(cap) = input.max_discount_amount {
            active.max_discount_amount = Set(Some(cap));
        }
        if let Some(max_uses) = input.max_uses {
            active.max_uses = Set(Some(max_uses));
        }
        if let Some(valid_from) = input.valid_from {
            active.valid_from = Set(valid_from);
        }
        if let Some(valid_until) = input.valid_until {
            active.valid_until = Set(Some(valid_until));
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let coupon = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::CouponUpdated(coupon.id))
            .await;
        Ok(coupon)
    }

    #[instrument(skip(self))]
    pub async fn delete_coupon(&self, coupon_id: Uuid) -> Result<(), ServiceError> {
        let result = Coupon::delete_by_id(coupon_id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Coupon {} not found",
                coupon_id
            )));
        }
        self.event_sender
            .send_or_log(Event::CouponDeleted(coupon_id))
            .await;
        Ok(())
    }

    pub async fn get_coupon(&self, coupon_id: Uuid) -> Result<coupon::Model, ServiceError> {
        Coupon::find_by_id(coupon_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", coupon_id)))
    }

    pub async fn list_coupons(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<coupon::Model>, u64), ServiceError> {
        let paginator = Coupon::find()
            .order_by_desc(coupon::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((data, total))
    }

    /// Looks up a coupon by code, case-insensitively.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<coupon::Model>, ServiceError> {
        Ok(Coupon::find()
            .filter(coupon::Column::Code.eq(normalize_code(code)))
            .one(&*self.db)
            .await?)
    }

    /// Validates a code against a subtotal and returns the quote the
    /// storefront shows next to the cart (discount plus expiry countdown).
    #[instrument(skip(self))]
    pub async fn validate_for_subtotal(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<CouponQuote, ServiceError> {
        let coupon = self
            .find_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", normalize_code(code))))?;

        quote_coupon(&coupon, subtotal, Utc::now())
    }

    /// Burns one use of a coupon. Callers run this inside the checkout
    /// transaction after re-validating applicability.
    pub async fn increment_usage(
        conn: &impl ConnectionTrait,
        coupon: coupon::Model,
    ) -> Result<coupon::Model, ServiceError> {
        let used_count = coupon.used_count;
        let mut active: coupon::ActiveModel = coupon.into();
        active.used_count = Set(used_count + 1);
        active.updated_at = Set(Utc::now());
        Ok(active.update(conn).await?)
    }
}

/// Checks every applicability rule and computes the discount for a subtotal.
/// Pure so checkout can re-run it against the coupon row it re-read inside
/// its own transaction.
pub fn quote_coupon(
    coupon: &coupon::Model,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<CouponQuote, ServiceError> {
    if !coupon.is_active {
        return Err(ServiceError::CouponNotApplicable(
            "This coupon is no longer active".to_string(),
        ));
    }
    if now < coupon.valid_from {
        return Err(ServiceError::CouponNotApplicable(
            "This coupon is not valid yet".to_string(),
        ));
    }
    if let Some(valid_until) = coupon.valid_until {
        if now > valid_until {
            return Err(ServiceError::CouponNotApplicable(
                "This coupon has expired".to_string(),
            ));
        }
    }
    if let Some(max_uses) = coupon.max_uses {
        if coupon.used_count >= max_uses {
            return Err(ServiceError::CouponNotApplicable(
                "This coupon has been fully redeemed".to_string(),
            ));
        }
    }
    if subtotal < coupon.min_order_amount {
        return Err(ServiceError::CouponNotApplicable(format!(
            "This coupon requires a minimum order of {}",
            coupon.min_order_amount.round_dp(2)
        )));
    }

    Ok(CouponQuote {
        code: coupon.code.clone(),
        description: coupon.description.clone(),
        discount_type: coupon.discount_type,
        discount_amount: discount_for(coupon, subtotal),
        expires_in_secs: expires_in_secs(coupon, now),
    })
}

/// Discount amount for a subtotal: percentage coupons cap at
/// `max_discount_amount` when set, flat coupons clamp to the subtotal so a
/// discount can never exceed what is being discounted.
pub fn discount_for(coupon: &coupon::Model, subtotal: Decimal) -> Decimal {
    let raw = match coupon.discount_type {
        CouponType::Percentage => {
            let discount = subtotal * coupon.discount_value / Decimal::from(100);
            match coupon.max_discount_amount {
                Some(cap) => discount.min(cap),
                None => discount,
            }
        }
        CouponType::Flat => coupon.discount_value,
    };

    raw.min(subtotal).round_dp(2)
}

/// Seconds until the coupon stops being valid. `None` when the coupon has no
/// end date; never negative so the storefront countdown can render it as-is.
pub fn expires_in_secs(coupon: &coupon::Model, now: DateTime<Utc>) -> Option<i64> {
    coupon
        .valid_until
        .map(|until| (until - now).num_seconds().max(0))
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn validate_discount(discount_type: CouponType, value: Decimal) -> Result<(), ServiceError> {
    if value <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Discount value must be positive".to_string(),
        ));
    }
    if discount_type == CouponType::Percentage && value > Decimal::from(100) {
        return Err(ServiceError::ValidationError(
            "Percentage discount cannot exceed 100".to_string(),
        ));
    }
    Ok(())
}

/// Input for creating a coupon
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCouponInput {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: CouponType,
    pub discount_value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub max_uses: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// Input for updating a coupon
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct UpdateCouponInput {
    pub description: Option<String>,
    pub discount_type: Option<CouponType>,
    pub discount_value: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub max_uses: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// What a valid coupon is worth against a given subtotal
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CouponQuote {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: CouponType,
    pub discount_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<i64>,
}
