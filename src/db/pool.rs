//! Database connection pool abstraction
//!
//! Foodgram runs on SQLite or MySQL. Both pools sit behind [`DatabasePool`];
//! a pool only has to hand out its [`Backend`], everything else (raw
//! statements, health checks, shutdown) is dispatched on that.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqlitePool, SqlitePoolOptions},
};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

/// Borrowed handle to the concrete pool behind a [`DatabasePool`].
///
/// Repositories match on this to pick the driver-specific query path.
#[derive(Clone, Copy)]
pub enum Backend<'a> {
    Sqlite(&'a SqlitePool),
    Mysql(&'a MySqlPool),
}

#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Concrete pool for driver-specific queries
    fn backend(&self) -> Backend<'_>;

    fn driver(&self) -> DatabaseDriver {
        match self.backend() {
            Backend::Sqlite(_) => DatabaseDriver::Sqlite,
            Backend::Mysql(_) => DatabaseDriver::Mysql,
        }
    }

    /// Run a statement that returns no rows (DDL, migrations)
    async fn execute(&self, statement: &str) -> Result<u64> {
        let result = match self.backend() {
            Backend::Sqlite(pool) => sqlx::query(statement).execute(pool).await.map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(statement).execute(pool).await.map(|r| r.rows_affected()),
        };
        result.with_context(|| format!("Failed to execute statement: {}", statement))
    }

    async fn ping(&self) -> Result<()> {
        let result = match self.backend() {
            Backend::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(drop),
            Backend::Mysql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(drop),
        };
        result.context("Database ping failed")
    }

    async fn close(&self) {
        match self.backend() {
            Backend::Sqlite(pool) => pool.close().await,
            Backend::Mysql(pool) => pool.close().await,
        }
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        match self.backend() {
            Backend::Sqlite(pool) => Some(pool),
            Backend::Mysql(_) => None,
        }
    }
}

/// Type alias for a shared database pool
pub type DynDatabasePool = Arc<dyn DatabasePool>;

pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open (creating if needed) a SQLite database with foreign keys enforced
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let (file, connection_url) = sqlite_location(url);
        if let Some(parent) = file.as_ref().and_then(|f| f.parent()) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    // Recipe links and marks rely on ON DELETE CASCADE
                    sqlx::query("PRAGMA foreign_keys = ON").execute(conn).await?;
                    Ok(())
                })
            })
            .connect(&connection_url)
            .await
            .with_context(|| format!("Failed to connect to SQLite database: {}", url))?;

        Ok(Self { pool })
    }
}

impl DatabasePool for SqliteDatabase {
    fn backend(&self) -> Backend<'_> {
        Backend::Sqlite(&self.pool)
    }
}

pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let connection_url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(&connection_url)
            .await
            .with_context(|| format!("Failed to connect to MySQL database: {}", url))?;

        Ok(Self { pool })
    }
}

impl DatabasePool for MysqlDatabase {
    fn backend(&self) -> Backend<'_> {
        Backend::Mysql(&self.pool)
    }
}

/// Database file (if any) and sqlx connection URL for a configured SQLite url.
///
/// Accepts a bare path, a `sqlite:` URL or `:memory:`; file databases are
/// opened in create mode unless the URL already carries options.
fn sqlite_location(url: &str) -> (Option<PathBuf>, String) {
    if url == ":memory:" || url.starts_with("sqlite::memory:") {
        let connection_url = if url == ":memory:" { "sqlite::memory:" } else { url };
        return (None, connection_url.to_string());
    }

    let (path, options) = match url.trim_start_matches("sqlite:").split_once('?') {
        Some((path, options)) => (path, Some(options)),
        None => (url.trim_start_matches("sqlite:"), None),
    };
    let connection_url = match options {
        Some(options) => format!("sqlite:{}?{}", path, options),
        None => format!("sqlite:{}?mode=rwc", path),
    };

    (Some(PathBuf::from(path)), connection_url)
}

/// Create a database connection pool based on configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let pool: DynDatabasePool = match config.driver {
        DatabaseDriver::Sqlite => {
            Arc::new(SqliteDatabase::connect(&config.url, config.max_connections).await?)
        }
        DatabaseDriver::Mysql => {
            Arc::new(MysqlDatabase::connect(&config.url, config.max_connections).await?)
        }
    };
    Ok(pool)
}

/// Create a SQLite in-memory database pool for testing
///
/// A single connection keeps transactions and reads on the same
/// in-memory database without shared-cache table locks.
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    let config = DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
        max_connections: 1,
    };
    create_pool(&config).await
}
