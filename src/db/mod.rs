//! Database layer
//!
//! Supports SQLite (default, single-file deployment) and MySQL. The driver is
//! selected from configuration and hidden behind the `DatabasePool` trait;
//! repositories match on [`Backend`] to run driver-specific SQL.
//!
//! ```ignore
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
