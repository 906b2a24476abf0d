use crate::{
    entities::{contact_message, content_page, setting, ContactMessage, ContentPage, Setting},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Setting keys the public storefront may read. Everything else stays
/// admin-only.
const PUBLIC_SETTING_KEYS: &[&str] = &[
    "store_name",
    "support_phone",
    "support_email",
    "whatsapp_number",
    "free_shipping_threshold",
    "flat_shipping_fee",
    "announcement",
];

/// CMS pages, contact-form submissions and the runtime settings store.
#[derive(Clone)]
pub struct ContentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ContentService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    // ---- pages ----

    /// A published page by slug. Unpublished pages 404 for shoppers.
    pub async fn get_page(&self, slug: &str) -> Result<content_page::Model, ServiceError> {
        ContentPage::find()
            .filter(content_page::Column::Slug.eq(slug))
            .filter(content_page::Column::IsPublished.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Page {} not found", slug)))
    }

    /// Page listing. The storefront (and the sitemap generator) see only
    /// published pages; the admin screen passes `include_unpublished`.
    pub async fn list_pages(
        &self,
        include_unpublished: bool,
    ) -> Result<Vec<content_page::Model>, ServiceError> {
        let mut query = ContentPage::find();
        if !include_unpublished {
            query = query.filter(content_page::Column::IsPublished.eq(true));
        }
        let pages = query
            .order_by_asc(content_page::Column::Slug)
            .all(&*self.db)
            .await?;
        Ok(pages)
    }

    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create_page(&self, input: PageInput) -> Result<content_page::Model, ServiceError> {
        let input = input.normalized();
        validate_page(&input)?;

        let existing = ContentPage::find()
            .filter(content_page::Column::Slug.eq(input.slug.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A page with slug {} already exists",
                input.slug
            )));
        }

        let now = Utc::now();
        let model = content_page::ActiveModel {
            id: Set(Uuid::new_v4()),
            slug: Set(input.slug),
            title: Set(input.title),
            body: Set(input.body),
            is_published: Set(input.is_published),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;
        info!("Content page {} created", created.slug);
        Ok(created)
    }

    /// Updates a page addressed by its current slug. The slug itself is
    /// immutable; storefront links and the sitemap depend on it.
    #[instrument(skip(self, input))]
    pub async fn update_page(
        &self,
        slug: &str,
        input: UpdatePageInput,
    ) -> Result<content_page::Model, ServiceError> {
        let page = ContentPage::find()
            .filter(content_page::Column::Slug.eq(slug))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Page {} not found", slug)))?;

        let mut active: content_page::ActiveModel = page.into();
        if let Some(title) = input.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(ServiceError::ValidationError(
                    "Title cannot be empty".to_string(),
                ));
            }
            active.title = Set(title);
        }
        if let Some(body) = input.body {
            active.body = Set(body);
        }
        if let Some(is_published) = input.is_published {
            active.is_published = Set(is_published);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_page(&self, slug: &str) -> Result<(), ServiceError> {
        let result = ContentPage::delete_many()
            .filter(content_page::Column::Slug.eq(slug))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Page {} not found", slug)));
        }
        info!("Content page {} deleted", slug);
        Ok(())
    }

    // ---- contact messages ----

    /// Stores a contact-form submission and notifies the back office.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn submit_contact(
        &self,
        input: ContactInput,
    ) -> Result<contact_message::Model, ServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Name is required".to_string(),
            ));
        }
        let email = input.email.trim().to_lowercase();
        if !validator::validate_email(&email) {
            return Err(ServiceError::ValidationError(
                "A valid email address is required".to_string(),
            ));
        }
        let message = input.message.trim().to_string();
        if message.is_empty() {
            return Err(ServiceError::ValidationError(
                "Message is required".to_string(),
            ));
        }

        let model = contact_message::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            email: Set(email),
            phone: Set(input
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())),
            subject: Set(input
                .subject
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())),
            message: Set(message),
            is_read: Set(false),
            created_at: Set(Utc::now()),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ContactMessageReceived(created.id))
            .await;
        Ok(created)
    }

    /// Inbox for the back office, unread first, newest first.
    pub async fn list_contacts(
        &self,
        unread_only: bool,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<contact_message::Model>, u64), ServiceError> {
        let mut query = ContactMessage::find();
        if unread_only {
            query = query.filter(contact_message::Column::IsRead.eq(false));
        }
        let paginator = query
            .order_by_asc(contact_message::Column::IsRead)
            .order_by_desc(contact_message::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let messages = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((messages, total))
    }

    /// Marks a message handled. Already-read messages pass through unchanged.
    pub async fn mark_contact_read(
        &self,
        message_id: Uuid,
    ) -> Result<contact_message::Model, ServiceError> {
        let message = ContactMessage::find_by_id(message_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Contact message {} not found", message_id))
            })?;
        if message.is_read {
            return Ok(message);
        }

        let mut active: contact_message::ActiveModel = message.into();
        active.is_read = Set(true);
        let updated = active.update(&*self.db).await?;
        Ok(updated)
    }

    // ---- settings ----

    /// The storefront-visible settings subset as a flat key/value map.
    pub async fn public_settings(&self) -> Result<BTreeMap<String, String>, ServiceError> {
        let rows = Setting::find()
            .filter(setting::Column::Key.is_in(PUBLIC_SETTING_KEYS.to_vec()))
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().map(|s| (s.key, s.value)).collect())
    }

    /// Every setting row, for the admin screen.
    pub async fn list_settings(&self) -> Result<Vec<setting::Model>, ServiceError> {
        let settings = Setting::find()
            .order_by_asc(setting::Column::Key)
            .all(&*self.db)
            .await?;
        Ok(settings)
    }

    /// Bulk upsert from the admin settings form. All keys land in one
    /// transaction so a partially-saved form can't happen.
    #[instrument(skip(self, values))]
    pub async fn upsert_settings(
        &self,
        values: BTreeMap<String, String>,
    ) -> Result<Vec<setting::Model>, ServiceError> {
        if values.is_empty() {
            return Err(ServiceError::ValidationError(
                "No settings provided".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        for (key, value) in values {
            let key = key.trim().to_string();
            if key.is_empty() {
                return Err(ServiceError::ValidationError(
                    "Setting keys cannot be empty".to_string(),
                ));
            }

            let existing = Setting::find_by_id(key.clone()).one(&txn).await?;
            match existing {
                Some(row) => {
                    let mut active: setting::ActiveModel = row.into();
                    active.value = Set(value);
                    active.updated_at = Set(Utc::now());
                    active.update(&txn).await?;
                }
                None => {
                    let model = setting::ActiveModel {
                        key: Set(key),
                        value: Set(value),
                        updated_at: Set(Utc::now()),
                    };
                    model.insert(&txn).await?;
                }
            }
        }
        txn.commit().await?;

        self.list_settings().await
    }
}

fn validate_page(input: &PageInput) -> Result<(), ServiceError> {
    if input.slug.is_empty() {
        return Err(ServiceError::ValidationError(
            "Slug is required".to_string(),
        ));
    }
    if !input
        .slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ServiceError::ValidationError(
            "Slug may only contain lowercase letters, digits and hyphens".to_string(),
        ));
    }
    if input.title.is_empty() {
        return Err(ServiceError::ValidationError(
            "Title is required".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PageInput {
    pub slug: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub is_published: bool,
}

impl PageInput {
    fn normalized(mut self) -> Self {
        self.slug = self.slug.trim().to_lowercase();
        self.title = self.title.trim().to_string();
        self
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePageInput {
    pub title: Option<String>,
    pub body: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContactInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: String,
}
