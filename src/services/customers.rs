use crate::{
    auth::{AuthService, AuthTokens},
    config::AppConfig,
    entities::{address, user, Address, User, UserRole},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Customer accounts and their address books.
///
/// Registration is customer-only; the single admin account is provisioned at
/// startup from configuration via [`CustomerService::ensure_admin_account`].
/// Login failures never reveal whether the email exists.
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    auth: Arc<AuthService>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl CustomerService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        auth: Arc<AuthService>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            auth,
            event_sender,
            config,
        }
    }

    // ---- auth ----

    /// Creates a customer account and signs it in.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<AuthOutcome, ServiceError> {
        let email = normalize_email(&input.email);
        if !validator::validate_email(&email) {
            return Err(ServiceError::ValidationError(
                "A valid email address is required".to_string(),
            ));
        }
        if input.password.len() < 8 {
            return Err(ServiceError::ValidationError(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        let full_name = input.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Name is required".to_string(),
            ));
        }
        if let Some(phone) = input.phone.as_deref() {
            validate_phone(phone)?;
        }

        let existing = User::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let password_hash = self.auth.hash_password(&input.password)?;
        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            password_hash: Set(password_hash),
            full_name: Set(full_name),
            phone: Set(input.phone.map(|p| p.trim().to_string())),
            role: Set(UserRole::Customer),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CustomerRegistered(created.id))
            .await;
        info!("Customer account created: {}", created.email);

        let tokens = self.auth.generate_token(&created)?;
        Ok(AuthOutcome::new(created, tokens))
    }

    /// Verifies credentials and issues a token. Wrong email and wrong
    /// password produce the same error so accounts can't be enumerated.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthOutcome, ServiceError> {
        let email = normalize_email(&input.email);
        let user = User::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::AuthError("Invalid email or password".to_string()))?;

        if self
            .auth
            .verify_password(&input.password, &user.password_hash)
            .is_err()
        {
            return Err(ServiceError::AuthError(
                "Invalid email or password".to_string(),
            ));
        }
        if !user.is_active {
            return Err(ServiceError::Forbidden(
                "This account has been disabled".to_string(),
            ));
        }

        let tokens = self.auth.generate_token(&user)?;
        Ok(AuthOutcome::new(user, tokens))
    }

    /// Loads the signed-in customer's profile.
    pub async fn profile(&self, customer_id: Uuid) -> Result<user::Model, ServiceError> {
        User::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Account not found".to_string()))
    }

    /// Creates the admin account from `APP__ADMIN_EMAIL` /
    /// `APP__ADMIN_PASSWORD` when it doesn't exist yet. Called once at
    /// startup; an existing account (whatever its role) is left untouched.
    #[instrument(skip(self))]
    pub async fn ensure_admin_account(&self) -> Result<Option<Uuid>, ServiceError> {
        let (email, password) = match (
            self.config.admin_email.as_deref().filter(|v| !v.is_empty()),
            self.config
                .admin_password
                .as_deref()
                .filter(|v| !v.is_empty()),
        ) {
            (Some(email), Some(password)) => (normalize_email(email), password),
            _ => {
                info!("Admin bootstrap skipped: no admin credentials configured");
                return Ok(None);
            }
        };

        let existing = User::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(&*self.db)
            .await?;
        if let Some(user) = existing {
            info!("Admin bootstrap skipped: account {} already exists", user.email);
            return Ok(None);
        }

        let password_hash = self.auth.hash_password(password)?;
        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.clone()),
            password_hash: Set(password_hash),
            full_name: Set("Store Admin".to_string()),
            phone: Set(None),
            role: Set(UserRole::Admin),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;

        info!("Admin account bootstrapped: {}", email);
        Ok(Some(created.id))
    }

    // ---- address book ----

    /// Lists the customer's saved addresses, default first.
    pub async fn list_addresses(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<address::Model>, ServiceError> {
        let addresses = Address::find()
            .filter(address::Column::CustomerId.eq(customer_id))
            .order_by_desc(address::Column::IsDefault)
            .order_by_desc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(addresses)
    }

    /// Saves a new address. The first address a customer saves becomes the
    /// default automatically; an explicit `is_default` demotes the previous
    /// default in the same transaction.
    #[instrument(skip(self, input))]
    pub async fn create_address(
        &self,
        customer_id: Uuid,
        input: AddressInput,
    ) -> Result<address::Model, ServiceError> {
        let input = input.normalized();
        validate_address(&input)?;

        let txn = self.db.begin().await?;

        let existing = Address::find()
            .filter(address::Column::CustomerId.eq(customer_id))
            .all(&txn)
            .await?;
        let make_default = input.is_default || existing.is_empty();
        if make_default {
            clear_default(&txn, customer_id).await?;
        }

        let now = Utc::now();
        let model = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            label: Set(input.label),
            recipient_name: Set(input.recipient_name),
            phone: Set(input.phone),
            line1: Set(input.line1),
            line2: Set(input.line2),
            city: Set(input.city),
            state: Set(input.state),
            postal_code: Set(input.postal_code),
            country: Set(input.country),
            is_default: Set(make_default),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&txn).await?;

        txn.commit().await?;
        Ok(created)
    }

    /// Updates a saved address the customer owns.
    #[instrument(skip(self, input))]
    pub async fn update_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
        input: AddressInput,
    ) -> Result<address::Model, ServiceError> {
        let input = input.normalized();
        validate_address(&input)?;

        let txn = self.db.begin().await?;

        let existing = Address::find_by_id(address_id)
            .filter(address::Column::CustomerId.eq(customer_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))?;

        if input.is_default && !existing.is_default {
            clear_default(&txn, customer_id).await?;
        }

        let mut active: address::ActiveModel = existing.into();
        active.label = Set(input.label);
        active.recipient_name = Set(input.recipient_name);
        active.phone = Set(input.phone);
        active.line1 = Set(input.line1);
        active.line2 = Set(input.line2);
        active.city = Set(input.city);
        active.state = Set(input.state);
        active.postal_code = Set(input.postal_code);
        active.country = Set(input.country);
        active.is_default = Set(input.is_default);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Deletes a saved address the customer owns. Deleting the default
    /// leaves no default; the next save or edit picks one.
    pub async fn delete_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<(), ServiceError> {
        let result = Address::delete_many()
            .filter(address::Column::Id.eq(address_id))
            .filter(address::Column::CustomerId.eq(customer_id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("Address not found".to_string()));
        }
        Ok(())
    }
}

async fn clear_default(
    conn: &impl sea_orm::ConnectionTrait,
    customer_id: Uuid,
) -> Result<(), ServiceError> {
    let defaults = Address::find()
        .filter(address::Column::CustomerId.eq(customer_id))
        .filter(address::Column::IsDefault.eq(true))
        .all(conn)
        .await?;
    for row in defaults {
        let mut active: address::ActiveModel = row.into();
        active.is_default = Set(false);
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;
    }
    Ok(())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_phone(phone: &str) -> Result<(), ServiceError> {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(10..=13).contains(&digits) {
        return Err(ServiceError::ValidationError(
            "Phone number must have 10 to 13 digits".to_string(),
        ));
    }
    Ok(())
}

fn validate_address(input: &AddressInput) -> Result<(), ServiceError> {
    if input.recipient_name.is_empty() {
        return Err(ServiceError::ValidationError(
            "Recipient name is required".to_string(),
        ));
    }
    validate_phone(&input.phone)?;
    if input.line1.is_empty() {
        return Err(ServiceError::ValidationError(
            "Address line 1 is required".to_string(),
        ));
    }
    if input.city.is_empty() || input.state.is_empty() {
        return Err(ServiceError::ValidationError(
            "City and state are required".to_string(),
        ));
    }
    if input.country == "IN" {
        let pin = &input.postal_code;
        if pin.len() != 6 || !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(ServiceError::ValidationError(
                "PIN code must be 6 digits".to_string(),
            ));
        }
    } else if input.postal_code.is_empty() {
        return Err(ServiceError::ValidationError(
            "Postal code is required".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Login/register response: the bearer token plus the account it belongs to.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthOutcome {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: user::Model,
}

impl AuthOutcome {
    fn new(user: user::Model, tokens: AuthTokens) -> Self {
        Self {
            token: tokens.access_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
            user,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddressInput {
    pub label: Option<String>,
    pub recipient_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    fn normalized(mut self) -> Self {
        self.label = self
            .label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        self.recipient_name = self.recipient_name.trim().to_string();
        self.phone = self.phone.trim().to_string();
        self.line1 = self.line1.trim().to_string();
        self.line2 = self
            .line2
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        self.city = self.city.trim().to_string();
        self.state = self.state.trim().to_string();
        self.postal_code = self.postal_code.trim().to_string();
        self.country = self.country.trim().to_uppercase();
        self
    }
}

fn default_country() -> String {
    "IN".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_address() -> AddressInput {
        AddressInput {
            label: Some("Home".to_string()),
            recipient_name: "Asha Verma".to_string(),
            phone: "+91 98765 43210".to_string(),
            line1: "12 MG Road".to_string(),
            line2: None,
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            postal_code: "560001".to_string(),
            country: "IN".to_string(),
            is_default: false,
        }
    }

    // ==================== Email normalization ====================

    #[test]
    fn email_is_lowercased_and_trimmed() {
        assert_eq!(normalize_email("  Asha@Example.COM "), "asha@example.com");
    }

    // ==================== Phone validation ====================

    #[test]
    fn phone_accepts_formatted_indian_numbers() {
        assert!(validate_phone("+91 98765 43210").is_ok());
        assert!(validate_phone("9876543210").is_ok());
    }

    #[test]
    fn phone_rejects_too_few_or_too_many_digits() {
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("12345678901234").is_err());
    }

    // ==================== Address validation ====================

    #[test]
    fn valid_address_passes() {
        assert!(validate_address(&sample_address().normalized()).is_ok());
    }

    #[test]
    fn indian_address_requires_six_digit_pin() {
        let mut input = sample_address();
        input.postal_code = "5600".to_string();
        assert!(validate_address(&input.normalized()).is_err());

        input = sample_address();
        input.postal_code = "56OO01".to_string();
        assert!(validate_address(&input.normalized()).is_err());
    }

    #[test]
    fn foreign_address_only_needs_nonempty_postal_code() {
        let mut input = sample_address();
        input.country = "AE".to_string();
        input.postal_code = "00000-XY".to_string();
        assert!(validate_address(&input.clone().normalized()).is_ok());

        input.postal_code = "  ".to_string();
        assert!(validate_address(&input.normalized()).is_err());
    }

    #[test]
    fn normalization_drops_blank_optional_fields() {
        let mut input = sample_address();
        input.label = Some("   ".to_string());
        input.line2 = Some(" ".to_string());
        let normalized = input.normalized();
        assert!(normalized.label.is_none());
        assert!(normalized.line2.is_none());
    }

    #[test]
    fn normalization_uppercases_country() {
        let mut input = sample_address();
        input.country = "in".to_string();
        assert_eq!(input.normalized().country, "IN");
    }
}
