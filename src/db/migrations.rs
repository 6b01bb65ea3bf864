//! Schema migrations
//!
//! The schema ships inside the binary: each [`Migration`] carries one SQL
//! script per driver. Applied versions are recorded in `_migrations`, so
//! `run_migrations` is safe to call on every start.

use anyhow::{Context, Result};
use std::collections::HashSet;

use super::{Backend, DynDatabasePool};
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// All schema migrations, applied in order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(254) NOT NULL UNIQUE,
                username VARCHAR(150) NOT NULL UNIQUE,
                first_name VARCHAR(150) NOT NULL,
                last_name VARCHAR(150) NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                email VARCHAR(254) NOT NULL UNIQUE,
                username VARCHAR(150) NOT NULL UNIQUE,
                first_name VARCHAR(150) NOT NULL,
                last_name VARCHAR(150) NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_ingredients",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS ingredients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL,
                measurement_unit VARCHAR(255) NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ingredients_name ON ingredients(name);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS ingredients (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(255) NOT NULL,
                measurement_unit VARCHAR(255) NOT NULL
            );
            CREATE INDEX idx_ingredients_name ON ingredients(name);
        "#,
    },
    Migration {
        version: 4,
        name: "create_tags",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL UNIQUE,
                slug VARCHAR(255) NOT NULL UNIQUE,
                color VARCHAR(7) NOT NULL
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(255) NOT NULL UNIQUE,
                slug VARCHAR(255) NOT NULL UNIQUE,
                color VARCHAR(7) NOT NULL
            );
        "#,
    },
    Migration {
        version: 5,
        name: "create_recipes",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS recipes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL,
                name VARCHAR(255) NOT NULL,
                text TEXT NOT NULL,
                cooking_time INTEGER NOT NULL CHECK (cooking_time >= 1),
                image VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_recipes_author_id ON recipes(author_id);
            CREATE INDEX IF NOT EXISTS idx_recipes_name ON recipes(name);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS recipes (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                author_id BIGINT NOT NULL,
                name VARCHAR(255) NOT NULL,
                text TEXT NOT NULL,
                cooking_time INT NOT NULL CHECK (cooking_time >= 1),
                image VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_recipes_author_id ON recipes(author_id);
            CREATE INDEX idx_recipes_name ON recipes(name);
        "#,
    },
    Migration {
        version: 6,
        name: "create_recipe_links",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS recipe_ingredients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recipe_id INTEGER NOT NULL,
                ingredient_id INTEGER NOT NULL,
                amount REAL NOT NULL CHECK (amount >= 0),
                UNIQUE (recipe_id, ingredient_id),
                FOREIGN KEY (recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
                FOREIGN KEY (ingredient_id) REFERENCES ingredients(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS recipe_tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recipe_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                UNIQUE (recipe_id, tag_id),
                FOREIGN KEY (recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_recipe_tags_tag_id ON recipe_tags(tag_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS recipe_ingredients (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                recipe_id BIGINT NOT NULL,
                ingredient_id BIGINT NOT NULL,
                amount DOUBLE NOT NULL CHECK (amount >= 0),
                UNIQUE KEY uq_recipe_ingredient (recipe_id, ingredient_id),
                FOREIGN KEY (recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
                FOREIGN KEY (ingredient_id) REFERENCES ingredients(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS recipe_tags (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                recipe_id BIGINT NOT NULL,
                tag_id BIGINT NOT NULL,
                UNIQUE KEY uq_recipe_tag (recipe_id, tag_id),
                FOREIGN KEY (recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_recipe_tags_tag_id ON recipe_tags(tag_id);
        "#,
    },
    Migration {
        version: 7,
        name: "create_recipe_marks",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS recipe_favorites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recipe_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                UNIQUE (recipe_id, user_id),
                FOREIGN KEY (recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_recipe_favorites_user_id ON recipe_favorites(user_id);
            CREATE TABLE IF NOT EXISTS shopping_cart (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recipe_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                UNIQUE (recipe_id, user_id),
                FOREIGN KEY (recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_shopping_cart_user_id ON shopping_cart(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS recipe_favorites (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                recipe_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                UNIQUE KEY uq_recipe_favorite (recipe_id, user_id),
                FOREIGN KEY (recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_recipe_favorites_user_id ON recipe_favorites(user_id);
            CREATE TABLE IF NOT EXISTS shopping_cart (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                recipe_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                UNIQUE KEY uq_shopping_cart (recipe_id, user_id),
                FOREIGN KEY (recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_shopping_cart_user_id ON shopping_cart(user_id);
        "#,
    },
    Migration {
        version: 8,
        name: "create_subscriptions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                UNIQUE (author_id, user_id),
                CHECK (author_id <> user_id),
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_subscriptions_user_id ON subscriptions(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                author_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                UNIQUE KEY uq_subscription (author_id, user_id),
                CONSTRAINT chk_no_self_subscription CHECK (author_id <> user_id),
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_subscriptions_user_id ON subscriptions(user_id);
        "#,
    },
];

/// Apply every migration not yet recorded, in version order.
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    ensure_migrations_table(pool).await?;
    let applied = applied_versions(pool).await?;

    let mut count = 0;
    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        tracing::info!("Applying migration {}: {}", migration.version, migration.name);
        apply(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count == 0 {
        tracing::debug!("Schema is up to date");
    }
    Ok(count)
}

async fn ensure_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let version_type = match pool.driver() {
        DatabaseDriver::Sqlite => "INTEGER",
        DatabaseDriver::Mysql => "INT",
    };
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version {} PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        version_type
    );

    pool.execute(&sql).await?;
    Ok(())
}

async fn applied_versions(pool: &DynDatabasePool) -> Result<HashSet<i32>> {
    const SQL: &str = "SELECT version FROM _migrations";

    let versions: Vec<i32> = match pool.backend() {
        Backend::Sqlite(p) => sqlx::query_scalar(SQL).fetch_all(p).await,
        Backend::Mysql(p) => sqlx::query_scalar(SQL).fetch_all(p).await,
    }
    .context("Failed to read applied migrations")?;

    Ok(versions.into_iter().collect())
}

async fn apply(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let script = match pool.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };
    for statement in statements(script) {
        pool.execute(statement).await?;
    }

    const RECORD: &str = "INSERT INTO _migrations (version, name) VALUES (?, ?)";
    let recorded = match pool.backend() {
        Backend::Sqlite(p) => {
            sqlx::query(RECORD)
                .bind(migration.version)
                .bind(migration.name)
                .execute(p)
                .await
                .map(|_| ())
        }
        Backend::Mysql(p) => {
            sqlx::query(RECORD)
                .bind(migration.version)
                .bind(migration.name)
                .execute(p)
                .await
                .map(|_| ())
        }
    };
    recorded.context("Failed to record migration")?;

    Ok(())
}

/// Non-empty statements of a script; the scripts contain no string literals
/// with `;` and no comments
fn statements(script: &str) -> impl Iterator<Item = &str> {
    script.split(';').map(str::trim).filter(|s| !s.is_empty())
}
