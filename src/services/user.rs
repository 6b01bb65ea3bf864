//! User service
//!
//! Business logic for accounts and authentication:
//! - registration with field validation and unique email/username
//! - login by email, returning a session token
//! - session validation (expired sessions are removed lazily) and logout
//! - password change

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

const MAX_EMAIL_LENGTH: usize = 254;
const MAX_USERNAME_LENGTH: usize = 150;
const MAX_NAME_LENGTH: usize = 150;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// User already exists
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found")]
    NotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    /// Create a new user service with custom session expiration
    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days,
        }
    }

    /// Register a new user.
    ///
    /// Names and email are trimmed before validation and storage; the
    /// password is hashed as given.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if any field is empty or malformed
    /// - `UserExists` if the email or username is already taken
    /// - `InternalError` for database errors
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let input = CreateUserInput::new(
            input.email.trim(),
            input.username.trim(),
            input.first_name.trim(),
            input.last_name.trim(),
            input.password,
        );
        validate_register_input(&input)?;

        if self
            .user_repo
            .get_by_email(&input.email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                input.email
            )));
        }

        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }

        let password_hash = hash_password(&input.password)?;
        let user = User::new(
            input.email,
            input.username,
            input.first_name,
            input.last_name,
            password_hash,
        );

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!("Registered user {} (id {})", created.username, created.id);
        Ok(created)
    }

    /// Authenticate by email and password and open a new session.
    ///
    /// Unknown email and wrong password produce the same error.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid email or password".to_string());

        let user = self
            .user_repo
            .get_by_email(email.trim())
            .await
            .context("Failed to get user by email")?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }

        let session = Session::new(
            Uuid::new_v4().simple().to_string(),
            user.id,
            Duration::days(self.session_expiration_days),
        );
        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        tracing::debug!("User {} logged in", user.id);
        Ok(created)
    }

    /// End a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Returns `None` for unknown or expired tokens; an expired session is
    /// deleted on the way out.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Change a user's password after checking the current one
    pub async fn set_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        if new_password.trim().is_empty() {
            return Err(UserServiceError::ValidationError(
                "New password cannot be empty".to_string(),
            ));
        }

        if !verify_password(current_password, &user.password_hash)? {
            return Err(UserServiceError::ValidationError(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = hash_password(new_password)?;
        self.user_repo
            .update_password(user.id, &password_hash)
            .await
            .context("Failed to update password")?;

        tracing::info!("User {} changed password", user.id);
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)
    }

    /// Users by id, newest first, with the total count
    pub async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), UserServiceError> {
        let page = self
            .user_repo
            .list(limit, offset)
            .await
            .context("Failed to list users")?;
        Ok(page)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;

        Ok(count)
    }
}

fn validate_register_input(input: &CreateUserInput) -> Result<(), UserServiceError> {
    let required = [
        ("Email", input.email.as_str()),
        ("Username", input.username.as_str()),
        ("First name", input.first_name.as_str()),
        ("Last name", input.last_name.as_str()),
    ];
    for (field, value) in required {
        if value.is_empty() {
            return Err(UserServiceError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
    }

    if input.password.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Password cannot be empty".to_string(),
        ));
    }

    if !input.email.contains('@') || input.email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        ));
    }

    if input.username.chars().count() > MAX_USERNAME_LENGTH || !USERNAME_RE.is_match(&input.username) {
        return Err(UserServiceError::ValidationError(
            "Username may contain only letters, digits and @/./+/-/_ (max 150)".to_string(),
        ));
    }

    if input.first_name.chars().count() > MAX_NAME_LENGTH || input.last_name.chars().count() > MAX_NAME_LENGTH {
        return Err(UserServiceError::ValidationError(
            "Names are limited to 150 characters".to_string(),
        ));
    }

    Ok(())
}
