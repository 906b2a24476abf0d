use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::services::notifications::NotificationService;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging a warning if the channel is closed or full.
    /// Event delivery is best-effort and must never fail the request that
    /// triggered it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartCreated(Uuid),
    CartItemAdded { cart_id: Uuid, product_id: Uuid },
    CartItemUpdated { cart_id: Uuid, item_id: Uuid },
    CartItemRemoved { cart_id: Uuid, item_id: Uuid },
    CartCleared(Uuid),
    CouponApplied { cart_id: Uuid, code: String },

    // Coupon lifecycle events
    CouponCreated { coupon_id: Uuid, code: String },
    CouponUpdated(Uuid),
    CouponDeleted(Uuid),

    // Order events
    OrderCreated(Uuid),
    OrderPaid(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancelled(Uuid),

    // Payment events
    PaymentCaptured(Uuid),
    PaymentFailed(Uuid),

    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductArchived(Uuid),

    // Customer events
    CustomerRegistered(Uuid),
    ReviewSubmitted { product_id: Uuid, review_id: Uuid },
    ContactMessageReceived(Uuid),

    // Generic event for custom messages
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    },
}

impl Event {
    /// Create a generic event with string data
    pub fn with_data(data: String) -> Self {
        Event::Generic {
            message: data,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }
}

// Function to process incoming events and fan them out to the notification
// pipeline. Runs until every EventSender clone has been dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifier: Arc<NotificationService>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!("Received event: {:?}", event);

        match event {
            Event::OrderCreated(order_id) => {
                if let Err(e) = notifier.send_order_confirmation(order_id).await {
                    error!(
                        "Failed to send order confirmation: order_id={}, error={}",
                        order_id, e
                    );
                }
            }
            Event::OrderPaid(order_id) => {
                if let Err(e) = notifier.send_payment_received(order_id).await {
                    error!(
                        "Failed to send payment receipt: order_id={}, error={}",
                        order_id, e
                    );
                }
            }
            Event::OrderStatusChanged {
                order_id,
                ref new_status,
                ..
            } => {
                if let Err(e) = notifier.send_order_status_update(order_id, new_status).await {
                    error!(
                        "Failed to send status update: order_id={}, error={}",
                        order_id, e
                    );
                }
            }
            Event::OrderCancelled(order_id) => {
                if let Err(e) = notifier.send_order_cancelled(order_id).await {
                    error!(
                        "Failed to send cancellation notice: order_id={}, error={}",
                        order_id, e
                    );
                }
            }
            Event::ContactMessageReceived(message_id) => {
                if let Err(e) = notifier.notify_admin_contact_message(message_id).await {
                    error!(
                        "Failed to forward contact message: message_id={}, error={}",
                        message_id, e
                    );
                }
            }
            Event::PaymentFailed(payment_id) => {
                warn!("Payment failed: {}", payment_id);
            }
            Event::PaymentCaptured(payment_id) => {
                info!("Payment captured: {}", payment_id);
            }
            _ => {
                debug!("No specific handler for event: {:?}", event);
            }
        }
    }

    warn!("Event processing loop has ended");
}
