use crate::{
    auth::AuthService,
    entities::{user, User},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Account registration and credential checks. Token issuance itself lives
/// in the auth module; this service owns the user records.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    auth: Arc<AuthService>,
    event_sender: EventSender,
}

impl UserService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        auth: Arc<AuthService>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            auth,
            event_sender,
        }
    }

    /// Creates an account and returns it with a fresh bearer token.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(
        &self,
        input: RegisterInput,
    ) -> Result<(user::Model, String), ServiceError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();

        let existing = User::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::ValidationError(
                "User already exists".to_string(),
            ));
        }

        let password_hash = self.auth.hash_password(&input.password)?;
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            email: Set(email),
            password_hash: Set(password_hash),
            is_admin: Set(false),
            shipping_address: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let user = user.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::UserRegistered(user.id))
            .await;
        info!("Registered user {}", user.id);

        let token = self.auth.issue_token(&user)?;
        Ok((user, token))
    }

    /// Verifies credentials and returns the account with a fresh token.
    /// The same error covers unknown email and wrong password.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<(user::Model, String), ServiceError> {
        let email = input.email.trim().to_lowercase();

        let user = User::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::Unauthorized("Invalid email or password".to_string())
            })?;

        if !self.auth.verify_password(&input.password, &user.password_hash)? {
            return Err(ServiceError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }

        let token = self.auth.issue_token(&user)?;
        Ok((user, token))
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }
}
