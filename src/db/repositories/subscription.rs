//! Subscription repository
//!
//! A subscription links a subscriber (`user_id`) to an author (`author_id`).

use super::placeholders;
use crate::db::{Backend, DynDatabasePool};
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::collections::HashSet;
use std::sync::Arc;

/// Subscription repository trait
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Subscribe. Returns false if the subscription already existed.
    async fn create(&self, subscriber_id: i64, author_id: i64) -> Result<bool>;

    /// Unsubscribe. Returns false if there was no such subscription.
    async fn delete(&self, subscriber_id: i64, author_id: i64) -> Result<bool>;

    /// Authors the subscriber follows, most recent subscription first, with the total
    async fn list_authors(&self, subscriber_id: i64, limit: i64, offset: i64) -> Result<(Vec<User>, i64)>;

    /// Subset of `author_ids` the subscriber follows
    async fn subscribed_author_ids(&self, subscriber_id: i64, author_ids: &[i64]) -> Result<HashSet<i64>>;
}

/// SQLx-based subscription repository implementation
pub struct SqlxSubscriptionRepository {
    pool: DynDatabasePool,
}

impl SqlxSubscriptionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SubscriptionRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_AUTHORS_SQL: &str = r#"
    SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.password_hash, u.created_at
    FROM subscriptions s
    INNER JOIN users u ON u.id = s.author_id
    WHERE s.user_id = ?
    ORDER BY s.id DESC
    LIMIT ? OFFSET ?
"#;

const COUNT_AUTHORS_SQL: &str = "SELECT COUNT(*) FROM subscriptions WHERE user_id = ?";

#[async_trait]
impl SubscriptionRepository for SqlxSubscriptionRepository {
    async fn create(&self, subscriber_id: i64, author_id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(
                "INSERT OR IGNORE INTO subscriptions (author_id, user_id) VALUES (?, ?)",
            )
            .bind(author_id)
            .bind(subscriber_id)
            .execute(pool)
            .await
            .context("Failed to create subscription")?
            .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(
                "INSERT IGNORE INTO subscriptions (author_id, user_id) VALUES (?, ?)",
            )
            .bind(author_id)
            .bind(subscriber_id)
            .execute(pool)
            .await
            .context("Failed to create subscription")?
            .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, subscriber_id: i64, author_id: i64) -> Result<bool> {
        let sql = "DELETE FROM subscriptions WHERE author_id = ? AND user_id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(author_id)
                .bind(subscriber_id)
                .execute(pool)
                .await
                .context("Failed to delete subscription")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(author_id)
                .bind(subscriber_id)
                .execute(pool)
                .await
                .context("Failed to delete subscription")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_authors(&self, subscriber_id: i64, limit: i64, offset: i64) -> Result<(Vec<User>, i64)> {
        let page = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let authors = sqlx::query(LIST_AUTHORS_SQL)
                    .bind(subscriber_id)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list subscriptions")?
                    .iter()
                    .map(|row| User {
                        id: row.get("id"),
                        email: row.get("email"),
                        username: row.get("username"),
                        first_name: row.get("first_name"),
                        last_name: row.get("last_name"),
                        password_hash: row.get("password_hash"),
                        created_at: row.get("created_at"),
                    })
                    .collect();
                let total: i64 = sqlx::query_scalar(COUNT_AUTHORS_SQL)
                    .bind(subscriber_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count subscriptions")?;
                (authors, total)
            }
            Backend::Mysql(pool) => {
                let authors = sqlx::query(LIST_AUTHORS_SQL)
                    .bind(subscriber_id)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list subscriptions")?
                    .iter()
                    .map(|row| User {
                        id: row.get("id"),
                        email: row.get("email"),
                        username: row.get("username"),
                        first_name: row.get("first_name"),
                        last_name: row.get("last_name"),
                        password_hash: row.get("password_hash"),
                        created_at: row.get("created_at"),
                    })
                    .collect();
                let total: i64 = sqlx::query_scalar(COUNT_AUTHORS_SQL)
                    .bind(subscriber_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count subscriptions")?;
                (authors, total)
            }
        };
        Ok(page)
    }

    async fn subscribed_author_ids(&self, subscriber_id: i64, author_ids: &[i64]) -> Result<HashSet<i64>> {
        if author_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let sql = format!(
            "SELECT author_id FROM subscriptions WHERE user_id = ? AND author_id IN ({})",
            placeholders(author_ids.len())
        );
        let ids = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(subscriber_id);
                for id in author_ids {
                    query = query.bind(*id);
                }
                query.fetch_all(pool).await
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(subscriber_id);
                for id in author_ids {
                    query = query.bind(*id);
                }
                query.fetch_all(pool).await
            }
        }
        .context("Failed to look up subscriptions")?;

        Ok(ids.into_iter().collect())
    }
}
