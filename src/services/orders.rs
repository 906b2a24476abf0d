use crate::{
    entities::{
        order,
        order::{OrderStatus, PaymentMethod, PaymentStatus},
        order_item, payment,
        payment::GatewayPaymentStatus,
        product_size, Order, OrderItem, Payment, Product, ProductSize,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, Iterable,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Sizes with this much stock or less show up on the admin dashboard.
const LOW_STOCK_THRESHOLD: i32 = 5;

/// Order service: customer order history, guest tracking, and the admin
/// status flow.
///
/// Status moves one step at a time along
/// pending -> confirmed -> packed -> shipped -> delivered, with cancellation
/// allowed until the parcel ships. Cancelling puts the stock back and flags
/// paid orders for refund.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    // ==================== Customer ====================

    #[instrument(skip(self))]
    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    #[instrument(skip(self))]
    pub async fn get_for_customer(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<OrderDetail, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .filter(|order| order.customer_id == Some(customer_id))
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        self.with_items(order).await
    }

    /// Guest tracking by order number + the email used at checkout. The
    /// not-found message stays vague on purpose so order numbers cannot be
    /// probed for customer emails.
    #[instrument(skip(self))]
    pub async fn track_order(
        &self,
        order_number: &str,
        email: &str,
    ) -> Result<OrderDetail, ServiceError> {
        let order_number = order_number.trim().to_uppercase();
        let email = email.trim().to_lowercase();

        let order = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .filter(order::Column::Email.eq(email))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        self.with_items(order).await
    }

    // ==================== Admin ====================

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: AdminOrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = Order::find();
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(payment_method) = filter.payment_method {
            query = query.filter(order::Column::PaymentMethod.eq(payment_method));
        }
        if let Some(from) = filter.from {
            query = query.filter(order::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(order::Column::CreatedAt.lte(to));
        }
        if let Some(search) = &filter.search {
            let term = search.trim();
            if !term.is_empty() {
                query = query.filter(
                    order::Column::OrderNumber
                        .contains(term)
                        .or(order::Column::Email.contains(term)),
                );
            }
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        self.with_items(order).await
    }

    /// Moves an order along the fulfilment flow.
    ///
    /// Setting the current status again is a no-op; any other move outside
    /// the allowed transitions is a conflict. Cancellation restores the
    /// stock each line took at checkout and marks paid orders refunded;
    /// delivering a COD order settles its payment.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.status == new_status {
            return Ok(order);
        }
        if !can_transition(order.status, new_status) {
            return Err(ServiceError::Conflict(format!(
                "Cannot move order {} from {} to {}",
                order.order_number, order.status, new_status
            )));
        }

        let old_status = order.status;
        let txn = self.db.begin().await?;

        let mut payment_status = order.payment_status;
        if new_status == OrderStatus::Cancelled {
            self.restore_stock(&txn, order.id).await?;
            if payment_status == PaymentStatus::Paid {
                payment_status = PaymentStatus::Refunded;
                self.mark_payments_refunded(&txn, order.id).await?;
            }
        }
        // Delivery settles cash-on-delivery orders
        if new_status == OrderStatus::Delivered
            && order.payment_method == PaymentMethod::Cod
            && payment_status == PaymentStatus::Pending
        {
            payment_status = PaymentStatus::Paid;
        }

        let order_number = order.order_number.clone();
        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.payment_status = Set(payment_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;
        if new_status == OrderStatus::Cancelled {
            self.event_sender.send_or_log(Event::OrderCancelled(order_id)).await;
        }

        info!(
            "Order {} moved from {} to {}",
            order_number, old_status, new_status
        );
        Ok(updated)
    }

    /// Admin dashboard: order counts per status, revenue windows, sizes
    /// running low, newest orders.
    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<DashboardSummary, ServiceError> {
        let counted = Order::find()
            .select_only()
            .column(order::Column::Status)
            .column_as(order::Column::Id.count(), "count")
            .group_by(order::Column::Status)
            .into_model::<StatusCountRow>()
            .all(&*self.db)
            .await?;
        let orders_by_status = OrderStatus::iter()
            .map(|status| StatusCount {
                status,
                count: counted
                    .iter()
                    .find(|row| row.status == status)
                    .map(|row| row.count)
                    .unwrap_or(0),
            })
            .collect();

        let now = Utc::now();
        let today_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(now);
        let revenue = RevenueSummary {
            today: self.revenue_since(today_start).await?,
            week: self.revenue_since(now - Duration::days(7)).await?,
            month: self.revenue_since(now - Duration::days(30)).await?,
        };

        let low_stock = ProductSize::find()
            .find_also_related(Product)
            .filter(product_size::Column::StockQty.lte(LOW_STOCK_THRESHOLD))
            .order_by_asc(product_size::Column::StockQty)
            .limit(10)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|(size, product)| LowStockSize {
                product_id: size.product_id,
                product_name: product.map(|p| p.name).unwrap_or_default(),
                size_label: size.size_label,
                stock_qty: size.stock_qty,
            })
            .collect();

        let recent_orders = Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .limit(5)
            .all(&*self.db)
            .await?;

        Ok(DashboardSummary {
            orders_by_status,
            revenue,
            low_stock,
            recent_orders,
        })
    }

    // ==================== Internals ====================

    async fn with_items(&self, order: order::Model) -> Result<OrderDetail, ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&*self.db)
            .await?;
        Ok(OrderDetail { order, items })
    }

    async fn revenue_since(&self, start: DateTime<Utc>) -> Result<Decimal, ServiceError> {
        let revenue = Order::find()
            .select_only()
            .column_as(order::Column::Total.sum(), "revenue")
            .filter(order::Column::CreatedAt.gte(start))
            .filter(order::Column::Status.ne(OrderStatus::Cancelled))
            .into_tuple::<Option<Decimal>>()
            .one(&*self.db)
            .await?
            .flatten()
            .unwrap_or(Decimal::ZERO);
        Ok(revenue)
    }

    /// Returns each line's quantity to its size row. Sizes the admin removed
    /// since the order was placed are skipped with a warning.
    async fn restore_stock(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(txn)
            .await?;
        for item in items {
            let size = ProductSize::find()
                .filter(product_size::Column::ProductId.eq(item.product_id))
                .filter(product_size::Column::SizeLabel.eq(item.size_label.clone()))
                .one(txn)
                .await?;
            match size {
                Some(size) => {
                    let restored = size.stock_qty + item.quantity;
                    let mut active: product_size::ActiveModel = size.into();
                    active.stock_qty = Set(restored);
                    active.update(txn).await?;
                }
                None => {
                    warn!(
                        "Size {} of product {} no longer exists, stock not restored",
                        item.size_label, item.product_id
                    );
                }
            }
        }
        Ok(())
    }

    async fn mark_payments_refunded(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let captured = Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .filter(payment::Column::Status.eq(GatewayPaymentStatus::Captured))
            .all(txn)
            .await?;
        for row in captured {
            let mut active: payment::ActiveModel = row.into();
            active.status = Set(GatewayPaymentStatus::Refunded);
            active.updated_at = Set(Utc::now());
            active.update(txn).await?;
        }
        Ok(())
    }
}

/// Allowed fulfilment moves: one step forward, or cancellation before the
/// parcel ships.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Confirmed, Packed)
            | (Packed, Shipped)
            | (Shipped, Delivered)
            | (Pending, Cancelled)
            | (Confirmed, Cancelled)
            | (Packed, Cancelled)
    )
}

/// Admin order list filters
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AdminOrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Matches order number or email
    pub search: Option<String>,
}

/// Order with its line items
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Debug, FromQueryResult)]
struct StatusCountRow {
    status: OrderStatus,
    count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevenueSummary {
    pub today: Decimal,
    pub week: Decimal,
    pub month: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LowStockSize {
    pub product_id: Uuid,
    pub product_name: String,
    pub size_label: String,
    pub stock_qty: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub orders_by_status: Vec<StatusCount>,
    pub revenue: RevenueSummary,
    pub low_stock: Vec<LowStockSize>,
    pub recent_orders: Vec<order::Model>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Transition Matrix ====================

    #[test]
    fn forward_chain_is_allowed_step_by_step() {
        use OrderStatus::*;
        assert!(can_transition(Pending, Confirmed));
        assert!(can_transition(Confirmed, Packed));
        assert!(can_transition(Packed, Shipped));
        assert!(can_transition(Shipped, Delivered));
    }

    #[test]
    fn skipping_steps_is_rejected() {
        use OrderStatus::*;
        assert!(!can_transition(Pending, Packed));
        assert!(!can_transition(Pending, Shipped));
        assert!(!can_transition(Confirmed, Delivered));
    }

    #[test]
    fn cancellation_allowed_only_before_shipment() {
        use OrderStatus::*;
        assert!(can_transition(Pending, Cancelled));
        assert!(can_transition(Confirmed, Cancelled));
        assert!(can_transition(Packed, Cancelled));
        assert!(!can_transition(Shipped, Cancelled));
        assert!(!can_transition(Delivered, Cancelled));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        use OrderStatus::*;
        for target in [Pending, Confirmed, Packed, Shipped, Delivered] {
            assert!(!can_transition(Cancelled, target));
            assert!(!can_transition(Delivered, target));
        }
    }

    #[test]
    fn backwards_moves_are_rejected() {
        use OrderStatus::*;
        assert!(!can_transition(Confirmed, Pending));
        assert!(!can_transition(Shipped, Packed));
        assert!(!can_transition(Delivered, Shipped));
    }
}
