use crate::{
    config::AppConfig,
    entities::{
        order, payment, GatewayPaymentStatus, Order, OrderStatus, Payment, PaymentStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// The only gateway we integrate with today. Stored on every payment row so
/// a second provider can be added without a migration.
const GATEWAY: &str = "razorpay";

/// Talks to the payment gateway and keeps the `payments` table in sync with
/// what the gateway reports.
///
/// Two trust paths converge here: the browser posts the checkout signature to
/// `verify_payment`, and the gateway posts server-to-server webhooks to
/// `handle_webhook`. Both verify an HMAC before touching any state, and both
/// are idempotent so replays and races between them are harmless. A captured
/// payment is never downgraded by a later event.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    http: reqwest::Client,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        http: reqwest::Client,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            http,
            event_sender,
            config,
        }
    }

    /// Registers an order with the gateway and records the pending payment
    /// attempt. Called by checkout after the order transaction has committed,
    /// so a gateway outage leaves a payable order rather than no order.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn create_gateway_order(
        &self,
        order: &order::Model,
    ) -> Result<PaymentHandoff, ServiceError> {
        let (key_id, key_secret) = self.credentials()?;
        let amount_minor = to_minor_units(order.total).ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Order total {} cannot be expressed in minor units",
                order.total
            ))
        })?;
        let currency = self.config.default_currency.clone();

        let request = GatewayOrderRequest {
            amount: amount_minor,
            currency: currency.clone(),
            receipt: order.order_number.clone(),
        };
        let url = format!(
            "{}/orders",
            self.config.payment_gateway_base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .basic_auth(&key_id, Some(&key_secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Payment gateway unreachable: {}", e);
                ServiceError::PaymentFailed("Payment gateway is unreachable".to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Gateway rejected order creation ({}): {}", status, body);
            return Err(ServiceError::PaymentFailed(format!(
                "Payment gateway rejected the order ({})",
                status
            )));
        }

        let gateway_order: GatewayOrderResponse = response.json().await.map_err(|e| {
            ServiceError::PaymentFailed(format!("Malformed gateway response: {}", e))
        })?;

        let now = Utc::now();
        let row = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            gateway: Set(GATEWAY.to_string()),
            gateway_order_id: Set(Some(gateway_order.id.clone())),
            gateway_payment_id: Set(None),
            gateway_signature: Set(None),
            amount: Set(order.total),
            currency: Set(currency.clone()),
            status: Set(GatewayPaymentStatus::Created),
            created_at: Set(now),
            updated_at: Set(now),
        };
        row.insert(&*self.db).await?;

        info!(
            "Gateway order {} created for order {}",
            gateway_order.id, order.order_number
        );

        Ok(PaymentHandoff {
            gateway_order_id: gateway_order.id,
            key_id,
            amount_minor,
            currency,
        })
    }

    /// Verifies the signature the gateway's checkout widget hands back to the
    /// browser and, on success, marks the payment captured and the order paid.
    ///
    /// The signature covers `"{gateway_order_id}|{gateway_payment_id}"` keyed
    /// with the gateway secret. A mismatch marks the attempt failed and maps
    /// to 422 so the storefront can offer a retry.
    #[instrument(skip(self, input), fields(gateway_order_id = %input.gateway_order_id))]
    pub async fn verify_payment(
        &self,
        input: VerifyPaymentInput,
    ) -> Result<PaymentVerification, ServiceError> {
        let (_, key_secret) = self.credentials()?;

        let row = Payment::find()
            .filter(payment::Column::GatewayOrderId.eq(input.gateway_order_id.clone()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Payment for gateway order {} not found",
                    input.gateway_order_id
                ))
            })?;

        if row.status == GatewayPaymentStatus::Captured {
            // Webhook or a replayed verify already settled this payment.
            let order = self.load_order(row.order_id).await?;
            return Ok(PaymentVerification {
                order_id: order.id,
                order_number: order.order_number,
                payment_status: row.status,
            });
        }

        let message = format!("{}|{}", input.gateway_order_id, input.gateway_payment_id);
        let expected = sign(&key_secret, message.as_bytes());
        if !constant_time_eq(&expected, &input.signature) {
            warn!(
                "Payment signature mismatch for gateway order {}",
                input.gateway_order_id
            );
            self.mark_failed(row).await?;
            return Err(ServiceError::PaymentVerificationFailed(
                "Payment signature does not match".to_string(),
            ));
        }

        self.capture(row, Some(input.gateway_payment_id), Some(input.signature))
            .await
    }

    /// Applies a gateway webhook. The raw body must verify against the
    /// `X-Gateway-Signature` header before anything is parsed.
    ///
    /// Unknown events and unknown gateway order ids are acknowledged without
    /// state changes so the gateway stops retrying deliveries we will never
    /// act on.
    #[instrument(skip(self, body, signature))]
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, ServiceError> {
        let secret = self
            .config
            .payment_webhook_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ServiceError::InvalidOperation("Payment webhooks are not configured".to_string())
            })?;
        let signature = signature.ok_or_else(|| {
            ServiceError::BadRequest("Missing X-Gateway-Signature header".to_string())
        })?;

        let expected = sign(secret, body);
        if !constant_time_eq(&expected, signature) {
            warn!("Payment webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "Invalid webhook signature".to_string(),
            ));
        }

        let envelope: WebhookEnvelope = serde_json::from_slice(body)
            .map_err(|e| ServiceError::BadRequest(format!("Invalid webhook payload: {}", e)))?;
        let entity = envelope.payload.payment.entity;

        let Some(gateway_order_id) = entity.order_id else {
            info!(
                "Webhook {} carries no order reference, ignoring",
                envelope.event
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let row = Payment::find()
            .filter(payment::Column::GatewayOrderId.eq(gateway_order_id.clone()))
            .one(&*self.db)
            .await?;
        let Some(row) = row else {
            warn!("Webhook for unknown gateway order {}", gateway_order_id);
            return Ok(WebhookOutcome::Ignored);
        };

        match envelope.event.as_str() {
            "payment.captured" => {
                if row.status == GatewayPaymentStatus::Captured {
                    return Ok(WebhookOutcome::Ignored);
                }
                self.capture(row, Some(entity.id), None).await?;
                Ok(WebhookOutcome::Processed)
            }
            "payment.failed" => {
                if row.status == GatewayPaymentStatus::Captured {
                    info!(
                        "Ignoring payment.failed for captured gateway order {}",
                        gateway_order_id
                    );
                    return Ok(WebhookOutcome::Ignored);
                }
                if row.status == GatewayPaymentStatus::Failed {
                    return Ok(WebhookOutcome::Ignored);
                }
                self.mark_failed(row).await?;
                Ok(WebhookOutcome::Processed)
            }
            other => {
                info!("Unhandled payment webhook event: {}", other);
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    // ---- internals ----

    fn credentials(&self) -> Result<(String, String), ServiceError> {
        let key_id = self
            .config
            .payment_gateway_key_id
            .as_deref()
            .filter(|v| !v.is_empty());
        let key_secret = self
            .config
            .payment_gateway_key_secret
            .as_deref()
            .filter(|v| !v.is_empty());
        match (self.config.payments_enabled, key_id, key_secret) {
            (true, Some(id), Some(secret)) => Ok((id.to_string(), secret.to_string())),
            _ => Err(ServiceError::InvalidOperation(
                "Online payments are not configured".to_string(),
            )),
        }
    }

    /// Marks the payment captured and the order paid in one transaction.
    /// Orders still pending move to confirmed; later statuses are left alone.
    async fn capture(
        &self,
        row: payment::Model,
        gateway_payment_id: Option<String>,
        gateway_signature: Option<String>,
    ) -> Result<PaymentVerification, ServiceError> {
        let payment_id = row.id;
        let order_id = row.order_id;

        let txn = self.db.begin().await?;

        let mut active: payment::ActiveModel = row.into();
        active.status = Set(GatewayPaymentStatus::Captured);
        if let Some(pid) = gateway_payment_id {
            active.gateway_payment_id = Set(Some(pid));
        }
        if let Some(sig) = gateway_signature {
            active.gateway_signature = Set(Some(sig));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let order_number = order.order_number.clone();
        let order_status = order.status;

        let mut order_active: order::ActiveModel = order.into();
        order_active.payment_status = Set(PaymentStatus::Paid);
        if order_status == OrderStatus::Pending {
            order_active.status = Set(OrderStatus::Confirmed);
        }
        order_active.updated_at = Set(Utc::now());
        order_active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PaymentCaptured(payment_id))
            .await;
        self.event_sender.send_or_log(Event::OrderPaid(order_id)).await;

        info!("Payment captured for order {}", order_number);

        Ok(PaymentVerification {
            order_id,
            order_number,
            payment_status: updated.status,
        })
    }

    /// Marks the attempt failed and reflects it on the order unless a
    /// concurrent capture already settled the payment.
    async fn mark_failed(&self, row: payment::Model) -> Result<(), ServiceError> {
        let payment_id = row.id;
        let order_id = row.order_id;

        let txn = self.db.begin().await?;

        let mut active: payment::ActiveModel = row.into();
        active.status = Set(GatewayPaymentStatus::Failed);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        if let Some(order) = Order::find_by_id(order_id).one(&txn).await? {
            if order.payment_status == PaymentStatus::Pending {
                let mut order_active: order::ActiveModel = order.into();
                order_active.payment_status = Set(PaymentStatus::Failed);
                order_active.updated_at = Set(Utc::now());
                order_active.update(&txn).await?;
            }
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PaymentFailed(payment_id))
            .await;
        Ok(())
    }

    async fn load_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }
}

/// HMAC-SHA256 over `message`, hex encoded, matching what the gateway sends.
fn sign(secret: &str, message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time string comparison so signature checks don't leak timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Converts a rupee amount to integer paise, the unit the gateway bills in.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED).round_dp(0).to_i64()
}

#[derive(Debug, Serialize)]
struct GatewayOrderRequest {
    amount: i64,
    currency: String,
    receipt: String,
}

#[derive(Debug, Deserialize)]
struct GatewayOrderResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    payload: WebhookPayload,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    payment: WebhookPaymentWrapper,
}

#[derive(Debug, Deserialize)]
struct WebhookPaymentWrapper {
    entity: WebhookPaymentEntity,
}

#[derive(Debug, Deserialize)]
struct WebhookPaymentEntity {
    id: String,
    order_id: Option<String>,
}

/// Everything the storefront needs to open the gateway's checkout widget.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentHandoff {
    pub gateway_order_id: String,
    pub key_id: String,
    pub amount_minor: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentInput {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentVerification {
    pub order_id: Uuid,
    pub order_number: String,
    pub payment_status: GatewayPaymentStatus,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    Ignored,
}
