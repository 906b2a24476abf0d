use crate::{
    entities::{product, review, user, Product, Review, User},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Product reviews with admin moderation. A review stays invisible on the
/// storefront until an admin approves it; each customer gets one review per
/// product.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Approved reviews for a live product, newest first.
    pub async fn list_for_product(
        &self,
        slug: &str,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ReviewView>, u64), ServiceError> {
        let product = self.find_live_product(slug).await?;

        let paginator = Review::find()
            .filter(review::Column::ProductId.eq(product.id))
            .filter(review::Column::IsApproved.eq(true))
            .order_by_desc(review::Column::CreatedAt)
            .find_also_related(User)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;

        let views = rows
            .into_iter()
            .map(|(review, reviewer)| ReviewView::from_row(review, reviewer))
            .collect();
        Ok((views, total))
    }

    /// Submits a review for moderation. Admins see it in the pending queue;
    /// shoppers see it only after approval.
    #[instrument(skip(self, input))]
    pub async fn submit(
        &self,
        customer_id: Uuid,
        slug: &str,
        input: ReviewInput,
    ) -> Result<review::Model, ServiceError> {
        if !(1..=5).contains(&input.rating) {
            return Err(ServiceError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        let product = self.find_live_product(slug).await?;

        let existing = Review::find()
            .filter(review::Column::ProductId.eq(product.id))
            .filter(review::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "You have already reviewed this product".to_string(),
            ));
        }

        let model = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            customer_id: Set(customer_id),
            rating: Set(input.rating),
            title: Set(input
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())),
            body: Set(input
                .body
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())),
            is_approved: Set(false),
            created_at: Set(Utc::now()),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ReviewSubmitted {
                product_id: product.id,
                review_id: created.id,
            })
            .await;
        info!(
            "Review {} submitted for product {} pending moderation",
            created.id, product.slug
        );
        Ok(created)
    }

    /// Moderation queue. `pending_only` hides already-approved reviews.
    pub async fn list_admin(
        &self,
        pending_only: bool,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<AdminReviewView>, u64), ServiceError> {
        let mut query = Review::find();
        if pending_only {
            query = query.filter(review::Column::IsApproved.eq(false));
        }

        let paginator = query
            .order_by_asc(review::Column::IsApproved)
            .order_by_desc(review::Column::CreatedAt)
            .find_also_related(Product)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;

        // Reviewer names come from a second lookup; sea-orm joins one
        // relation at a time through find_also_related.
        let customer_ids: Vec<Uuid> = rows.iter().map(|(r, _)| r.customer_id).collect();
        let reviewers: std::collections::HashMap<Uuid, String> = User::find()
            .filter(user::Column::Id.is_in(customer_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.full_name))
            .collect();

        let views = rows
            .into_iter()
            .map(|(review, product)| AdminReviewView {
                reviewer_name: reviewers.get(&review.customer_id).cloned(),
                product_name: product.map(|p| p.name),
                id: review.id,
                product_id: review.product_id,
                customer_id: review.customer_id,
                rating: review.rating,
                title: review.title,
                body: review.body,
                is_approved: review.is_approved,
                created_at: review.created_at,
            })
            .collect();
        Ok((views, total))
    }

    /// Publishes a review. Approving twice is a no-op.
    #[instrument(skip(self))]
    pub async fn approve(&self, review_id: Uuid) -> Result<review::Model, ServiceError> {
        let review = Review::find_by_id(review_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Review {} not found", review_id)))?;
        if review.is_approved {
            return Ok(review);
        }

        let mut active: review::ActiveModel = review.into();
        active.is_approved = Set(true);
        let updated = active.update(&*self.db).await?;
        info!("Review {} approved", updated.id);
        Ok(updated)
    }

    /// Removes a review outright (spam, abuse, or on customer request).
    #[instrument(skip(self))]
    pub async fn delete(&self, review_id: Uuid) -> Result<(), ServiceError> {
        let result = Review::delete_by_id(review_id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Review {} not found",
                review_id
            )));
        }
        Ok(())
    }

    async fn find_live_product(&self, slug: &str) -> Result<product::Model, ServiceError> {
        Product::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", slug)))
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewInput {
    pub rating: i32,
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Storefront-facing review: reviewer shown by first name only.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewView {
    pub id: Uuid,
    pub rating: i32,
    pub title: Option<String>,
    pub body: Option<String>,
    pub reviewer: String,
    pub created_at: DateTime<Utc>,
}

impl ReviewView {
    fn from_row(review: review::Model, reviewer: Option<user::Model>) -> Self {
        let reviewer = reviewer
            .map(|u| display_name(&u.full_name))
            .unwrap_or_else(|| "A customer".to_string());
        Self {
            id: review.id,
            rating: review.rating,
            title: review.title,
            body: review.body,
            reviewer,
            created_at: review.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminReviewView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub customer_id: Uuid,
    pub reviewer_name: Option<String>,
    pub rating: i32,
    pub title: Option<String>,
    pub body: Option<String>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

/// First name only, so "Asha Verma" reads as "Asha" on the storefront.
fn display_name(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .next()
        .unwrap_or("A customer")
        .to_string()
}
