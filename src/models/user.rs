//! User model
//!
//! Registered users authenticate by email; the username is the public handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity representing a registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique, login key)
    pub email: String,
    /// Username (unique)
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the given parameters.
    ///
    /// The password must already be hashed (see `services::password::hash_password`).
    pub fn new(
        email: String,
        username: String,
        first_name: String,
        last_name: String,
        password_hash: String,
    ) -> Self {
        Self {
            id: 0, // Will be set by the database
            email,
            username,
            first_name,
            last_name,
            password_hash,
            created_at: Utc::now(),
        }
    }

    /// Check if the user wrote the recipe (or any record) owned by `author_id`
    pub fn is_author_of(&self, author_id: i64) -> bool {
        self.id == author_id
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Plaintext password (will be hashed)
    pub password: String,
}

impl CreateUserInput {
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            password: password.into(),
        }
    }
}
