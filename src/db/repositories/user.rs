//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use super::placeholders;
use crate::db::{Backend, DynDatabasePool};
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const USER_COLUMNS: &str =
    "id, email, username, first_name, last_name, password_hash, created_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get every user whose id is in `ids` (unordered, missing ids skipped)
    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<User>>;

    /// List users, newest first, with the total count
    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64)>;

    /// Replace the stored password hash
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, user).await,
            Backend::Mysql(pool) => create_user_mysql(pool, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_where_sqlite(pool, "id = ?", id).await,
            Backend::Mysql(pool) => get_user_where_mysql(pool, "id = ?", id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_where_sqlite(pool, "email = ?", email.to_string()).await,
            Backend::Mysql(pool) => get_user_where_mysql(pool, "email = ?", email.to_string()).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_where_sqlite(pool, "username = ?", username.to_string()).await,
            Backend::Mysql(pool) => get_user_where_mysql(pool, "username = ?", username.to_string()).await,
        }
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_users_by_ids_sqlite(pool, ids).await,
            Backend::Mysql(pool) => get_users_by_ids_mysql(pool, ids).await,
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64)> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_users_sqlite(pool, limit, offset).await,
            Backend::Mysql(pool) => list_users_mysql(pool, limit, offset).await,
        }
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let sql = "UPDATE users SET password_hash = ? WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(password_hash)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to update password")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(password_hash)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to update password")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, username, first_name, last_name, password_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        ..user.clone()
    })
}

async fn get_user_where_sqlite<T>(pool: &SqlitePool, clause: &str, value: T) -> Result<Option<User>>
where
    T: 'static + Send + for<'q> sqlx::Encode<'q, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, clause);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", clause))?;

    Ok(row.as_ref().map(row_to_user_sqlite))
}

async fn get_users_by_ids_sqlite(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE id IN ({})",
        USER_COLUMNS,
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to get users by ids")?;

    Ok(rows.iter().map(row_to_user_sqlite).collect())
}

async fn list_users_sqlite(pool: &SqlitePool, limit: i64, offset: i64) -> Result<(Vec<User>, i64)> {
    let sql = format!(
        "SELECT {} FROM users ORDER BY id DESC LIMIT ? OFFSET ?",
        USER_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;

    Ok((rows.iter().map(row_to_user_sqlite).collect(), total))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, username, first_name, last_name, password_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..user.clone()
    })
}

async fn get_user_where_mysql<T>(pool: &MySqlPool, clause: &str, value: T) -> Result<Option<User>>
where
    T: 'static + Send + for<'q> sqlx::Encode<'q, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, clause);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", clause))?;

    Ok(row.as_ref().map(row_to_user_mysql))
}

async fn get_users_by_ids_mysql(pool: &MySqlPool, ids: &[i64]) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE id IN ({})",
        USER_COLUMNS,
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to get users by ids")?;

    Ok(rows.iter().map(row_to_user_mysql).collect())
}

async fn list_users_mysql(pool: &MySqlPool, limit: i64, offset: i64) -> Result<(Vec<User>, i64)> {
    let sql = format!(
        "SELECT {} FROM users ORDER BY id DESC LIMIT ? OFFSET ?",
        USER_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;

    Ok((rows.iter().map(row_to_user_mysql).collect(), total))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}
