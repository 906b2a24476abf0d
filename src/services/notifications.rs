use crate::{
    config::AppConfig,
    entities::{
        notification_log, order, ContactMessage, NotificationChannelKind, NotificationStatus,
        Order,
    },
    errors::ServiceError,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Fan-out target for a composed notification. Implementations deliver to
/// one medium; the service records every attempt in `notification_logs`.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> NotificationChannelKind;
    fn is_enabled(&self) -> bool;
    async fn deliver(&self, recipient: &str, note: &Notification) -> Result<(), String>;
}

/// A composed message before channel fan-out.
#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient_email: String,
    pub recipient_phone: Option<String>,
    pub subject: String,
    pub body: String,
    pub reference_type: &'static str,
    pub reference_id: Uuid,
}

/// Sends customer and back-office notifications off the event loop.
///
/// Nothing here may fail a storefront request: the event loop calls these
/// methods after the triggering transaction has committed, and a channel
/// failure becomes a `failed` log row, not an error for the shopper.
pub struct NotificationService {
    db: Arc<DatabaseConnection>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    config: Arc<AppConfig>,
}

impl NotificationService {
    pub fn new(db: Arc<DatabaseConnection>, http: reqwest::Client, config: Arc<AppConfig>) -> Self {
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![
            Arc::new(EmailLogChannel),
            Arc::new(WhatsAppChannel::from_config(http, &config)),
        ];
        Self {
            db,
            channels,
            config,
        }
    }

    /// Swaps the channel list, for tests and future providers.
    pub fn with_channels(mut self, channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        self.channels = channels;
        self
    }

    #[instrument(skip(self))]
    pub async fn send_order_confirmation(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order = self.load_order(order_id).await?;
        self.dispatch(order_confirmation_note(&order)).await
    }

    #[instrument(skip(self))]
    pub async fn send_payment_received(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order = self.load_order(order_id).await?;
        self.dispatch(payment_received_note(&order)).await
    }

    #[instrument(skip(self))]
    pub async fn send_order_status_update(
        &self,
        order_id: Uuid,
        new_status: &str,
    ) -> Result<(), ServiceError> {
        let order = self.load_order(order_id).await?;
        self.dispatch(status_update_note(&order, new_status)).await
    }

    #[instrument(skip(self))]
    pub async fn send_order_cancelled(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order = self.load_order(order_id).await?;
        self.dispatch(order_cancelled_note(&order)).await
    }

    /// Forwards a contact-form submission to the configured admin address.
    /// Without one there is nowhere to send it; the attempt logs as skipped.
    #[instrument(skip(self))]
    pub async fn notify_admin_contact_message(&self, message_id: Uuid) -> Result<(), ServiceError> {
        let message = ContactMessage::find_by_id(message_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Contact message {} not found", message_id))
            })?;

        let Some(admin_email) = self
            .config
            .admin_email
            .as_deref()
            .filter(|v| !v.is_empty())
        else {
            warn!("Contact message received but no admin email is configured");
            self.log_attempt(
                NotificationChannelKind::Email,
                "unconfigured",
                Some("New contact message".to_string()),
                format!("Contact message from {} <{}>", message.name, message.email),
                "contact_message",
                message.id,
                NotificationStatus::Skipped,
                Some("No admin email configured".to_string()),
            )
            .await?;
            return Ok(());
        };

        let subject = match message.subject.as_deref() {
            Some(s) => format!("Contact form: {}", s),
            None => "New contact form message".to_string(),
        };
        let body = format!(
            "{} <{}> wrote:\n\n{}",
            message.name, message.email, message.message
        );
        self.dispatch(Notification {
            recipient_email: admin_email.to_string(),
            recipient_phone: None,
            subject,
            body,
            reference_type: "contact_message",
            reference_id: message.id,
        })
        .await
    }

    /// Runs the note through every channel, logging one row per attempt.
    async fn dispatch(&self, note: Notification) -> Result<(), ServiceError> {
        for channel in &self.channels {
            let recipient = match channel.kind() {
                NotificationChannelKind::Email => Some(note.recipient_email.clone()),
                NotificationChannelKind::Whatsapp => note.recipient_phone.clone(),
            };

            let (recipient, status, error) = match recipient {
                None => (
                    "none".to_string(),
                    NotificationStatus::Skipped,
                    Some("No recipient for channel".to_string()),
                ),
                Some(to) if !channel.is_enabled() => (to, NotificationStatus::Skipped, None),
                Some(to) => match channel.deliver(&to, &note).await {
                    Ok(()) => (to, NotificationStatus::Sent, None),
                    Err(e) => {
                        warn!(
                            "Notification delivery failed on {}: {}",
                            channel.kind(),
                            e
                        );
                        (to, NotificationStatus::Failed, Some(e))
                    }
                },
            };

            self.log_attempt(
                channel.kind(),
                &recipient,
                Some(note.subject.clone()),
                note.body.clone(),
                note.reference_type,
                note.reference_id,
                status,
                error,
            )
            .await?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn log_attempt(
        &self,
        channel: NotificationChannelKind,
        recipient: &str,
        subject: Option<String>,
        body: String,
        reference_type: &str,
        reference_id: Uuid,
        status: NotificationStatus,
        error: Option<String>,
    ) -> Result<(), ServiceError> {
        let row = notification_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            channel: Set(channel),
            recipient: Set(recipient.to_string()),
            subject: Set(subject),
            body: Set(body),
            reference_type: Set(Some(reference_type.to_string())),
            reference_id: Set(Some(reference_id)),
            status: Set(status),
            error: Set(error),
            created_at: Set(Utc::now()),
        };
        row.insert(&*self.db).await?;
        Ok(())
    }

    async fn load_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }
}

// ---- message composition ----

fn order_confirmation_note(order: &order::Model) -> Notification {
    Notification {
        recipient_email: order.email.clone(),
        recipient_phone: Some(order.phone.clone()),
        subject: format!("Order {} confirmed", order.order_number),
        body: format!(
            "Hi {}, thanks for shopping at Happy Hopz! Your order {} for \u{20b9}{} has been placed. We'll message you when it ships.",
            first_name(&order.shipping_name),
            order.order_number,
            order.total.round_dp(2)
        ),
        reference_type: "order",
        reference_id: order.id,
    }
}

fn payment_received_note(order: &order::Model) -> Notification {
    Notification {
        recipient_email: order.email.clone(),
        recipient_phone: Some(order.phone.clone()),
        subject: format!("Payment received for order {}", order.order_number),
        body: format!(
            "Hi {}, we've received your payment of \u{20b9}{} for order {}.",
            first_name(&order.shipping_name),
            order.total.round_dp(2),
            order.order_number
        ),
        reference_type: "order",
        reference_id: order.id,
    }
}

fn status_update_note(order: &order::Model, new_status: &str) -> Notification {
    Notification {
        recipient_email: order.email.clone(),
        recipient_phone: Some(order.phone.clone()),
        subject: format!("Order {} update", order.order_number),
        body: format!(
            "Hi {}, your order {} {}",
            first_name(&order.shipping_name),
            order.order_number,
            status_line(new_status)
        ),
        reference_type: "order",
        reference_id: order.id,
    }
}

fn order_cancelled_note(order: &order::Model) -> Notification {
    Notification {
        recipient_email: order.email.clone(),
        recipient_phone: Some(order.phone.clone()),
        subject: format!("Order {} cancelled", order.order_number),
        body: format!(
            "Hi {}, your order {} has been cancelled. Any payment made will be refunded within 5-7 business days.",
            first_name(&order.shipping_name),
            order.order_number
        ),
        reference_type: "order",
        reference_id: order.id,
    }
}

fn status_line(new_status: &str) -> String {
    match new_status {
        "confirmed" => "has been confirmed.".to_string(),
        "packed" => "has been packed and is ready to ship.".to_string(),
        "shipped" => "is on its way!".to_string(),
        "delivered" => "has been delivered. We hope the shoes fit perfectly!".to_string(),
        other => format!("is now {}.", other),
    }
}

fn first_name(full_name: &str) -> &str {
    full_name.split_whitespace().next().unwrap_or("there")
}

// ---- channels ----

/// Always-on channel that records the message as its own delivery. Stands in
/// for a real mail provider; the log table doubles as the outbox.
struct EmailLogChannel;

#[async_trait]
impl NotificationChannel for EmailLogChannel {
    fn kind(&self) -> NotificationChannelKind {
        NotificationChannelKind::Email
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn deliver(&self, recipient: &str, note: &Notification) -> Result<(), String> {
        info!("Email to {}: {}", recipient, note.subject);
        Ok(())
    }
}

/// WhatsApp-style HTTP provider. Disabled until both the endpoint and the
/// token are configured.
struct WhatsAppChannel {
    http: reqwest::Client,
    api_url: Option<String>,
    api_token: Option<String>,
}

impl WhatsAppChannel {
    fn from_config(http: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            http,
            api_url: config
                .whatsapp_api_url
                .clone()
                .filter(|v| !v.is_empty()),
            api_token: config
                .whatsapp_api_token
                .clone()
                .filter(|v| !v.is_empty()),
        }
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn kind(&self) -> NotificationChannelKind {
        NotificationChannelKind::Whatsapp
    }

    fn is_enabled(&self) -> bool {
        self.api_url.is_some() && self.api_token.is_some()
    }

    async fn deliver(&self, recipient: &str, note: &Notification) -> Result<(), String> {
        let (url, token) = match (&self.api_url, &self.api_token) {
            (Some(url), Some(token)) => (url, token),
            _ => return Err("WhatsApp channel is not configured".to_string()),
        };

        let payload = serde_json::json!({
            "to": recipient,
            "message": note.body,
        });
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| format!("WhatsApp API unreachable: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("WhatsApp API returned {}", response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{OrderStatus, PaymentMethod, PaymentStatus};
    use rust_decimal_macros::dec;

    fn sample_order() -> order::Model {
        let now = Utc::now();
        order::Model {
            id: Uuid::new_v4(),
            order_number: "HH-7K2M9P".to_string(),
            customer_id: None,
            email: "asha@example.com".to_string(),
            phone: "9876543210".to_string(),
            status: OrderStatus::Confirmed,
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Pending,
            subtotal: dec!(1198.00),
            discount_amount: dec!(0),
            coupon_code: None,
            shipping_fee: dec!(0),
            gst_amount: dec!(128.36),
            total: dec!(1198.00),
            shipping_name: "Asha Verma".to_string(),
            shipping_line1: "12 MG Road".to_string(),
            shipping_line2: None,
            shipping_city: "Bengaluru".to_string(),
            shipping_state: "Karnataka".to_string(),
            shipping_postal_code: "560001".to_string(),
            shipping_country: "IN".to_string(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    // ==================== Composition ====================

    #[test]
    fn confirmation_note_addresses_shopper_by_first_name() {
        let note = order_confirmation_note(&sample_order());
        assert!(note.body.starts_with("Hi Asha,"));
        assert!(note.body.contains("HH-7K2M9P"));
        assert!(note.body.contains("\u{20b9}1198.00"));
        assert_eq!(note.reference_type, "order");
        assert_eq!(note.recipient_email, "asha@example.com");
        assert_eq!(note.recipient_phone.as_deref(), Some("9876543210"));
    }

    #[test]
    fn status_lines_cover_the_fulfilment_steps() {
        assert_eq!(status_line("shipped"), "is on its way!");
        assert!(status_line("delivered").contains("delivered"));
        assert!(status_line("packed").contains("packed"));
        // Unknown statuses still read as a sentence
        assert_eq!(status_line("on-hold"), "is now on-hold.");
    }

    #[test]
    fn cancelled_note_mentions_refund() {
        let note = order_cancelled_note(&sample_order());
        assert!(note.body.contains("refunded"));
        assert!(note.subject.contains("cancelled"));
    }

    #[test]
    fn first_name_handles_blank_names() {
        assert_eq!(first_name("Asha Verma"), "Asha");
        assert_eq!(first_name(""), "there");
    }

    // ==================== Channel gating ====================

    fn test_config() -> AppConfig {
        AppConfig::new(
            "sqlite://happy_hopz.db?mode=memory".into(),
            "kQ7vXz3mWn9pLr4tYu8sDf2gHj5bNc6eRa1iKo0qZxUvMwEyTl9hPd3sBf7jGn2r".into(),
            86_400,
            "127.0.0.1".into(),
            0,
            "development".into(),
        )
    }

    #[test]
    fn whatsapp_channel_disabled_without_config() {
        let config = test_config();
        let channel = WhatsAppChannel::from_config(reqwest::Client::new(), &config);
        assert!(!channel.is_enabled());
    }

    #[test]
    fn whatsapp_channel_enabled_with_url_and_token() {
        let mut config = test_config();
        config.whatsapp_api_url = Some("https://wa.example/send".to_string());
        config.whatsapp_api_token = Some("token-123".to_string());
        let channel = WhatsAppChannel::from_config(reqwest::Client::new(), &config);
        assert!(channel.is_enabled());
        assert_eq!(channel.kind(), NotificationChannelKind::Whatsapp);
    }
}
