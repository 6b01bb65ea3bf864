//! Session repository
//!
//! Auth tokens issued at login. Lookups by token happen on every
//! authenticated request.

use crate::db::{Backend, DynDatabasePool};
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by token
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete expired sessions, returning how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_SESSION: &str =
    "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)";
const SELECT_SESSION: &str =
    "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?";

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(INSERT_SESSION)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(pool)
                    .await
                    .context("Failed to create session")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(INSERT_SESSION)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(pool)
                    .await
                    .context("Failed to create session")?;
            }
        }
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        let session = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(SELECT_SESSION)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get session by ID")?
                .map(|row| Session {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }),
            Backend::Mysql(pool) => sqlx::query(SELECT_SESSION)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get session by ID")?
                .map(|row| Session {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }),
        };
        Ok(session)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let sql = "DELETE FROM sessions WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete session")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete session")?;
            }
        }
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64> {
        let sql = "DELETE FROM sessions WHERE expires_at < ?";
        let now = Utc::now();
        let removed = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
        };
        Ok(removed)
    }
}
