//! Ingredient repository
//!
//! Ingredients are reference data; recipes only link to them.

use super::placeholders;
use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateIngredientInput, Ingredient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Ingredient repository trait
#[async_trait]
pub trait IngredientRepository: Send + Sync {
    async fn create(&self, input: &CreateIngredientInput) -> Result<Ingredient>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Ingredient>>;

    /// Get every ingredient whose id is in `ids`
    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Ingredient>>;

    /// Ingredients whose name starts with `prefix` (case-insensitive), by name.
    /// `None` lists everything.
    async fn search(&self, prefix: Option<&str>) -> Result<Vec<Ingredient>>;
}

/// SQLx-based ingredient repository implementation
pub struct SqlxIngredientRepository {
    pool: DynDatabasePool,
}

impl SqlxIngredientRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn IngredientRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl IngredientRepository for SqlxIngredientRepository {
    async fn create(&self, input: &CreateIngredientInput) -> Result<Ingredient> {
        let sql = "INSERT INTO ingredients (name, measurement_unit) VALUES (?, ?)";
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&input.name)
                .bind(&input.measurement_unit)
                .execute(pool)
                .await
                .context("Failed to create ingredient")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&input.name)
                .bind(&input.measurement_unit)
                .execute(pool)
                .await
                .context("Failed to create ingredient")?
                .last_insert_id() as i64,
        };

        Ok(Ingredient {
            id,
            name: input.name.clone(),
            measurement_unit: input.measurement_unit.clone(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Ingredient>> {
        Ok(self.get_by_ids(&[id]).await?.into_iter().next())
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Ingredient>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_ingredients_by_ids_sqlite(pool, ids).await,
            Backend::Mysql(pool) => get_ingredients_by_ids_mysql(pool, ids).await,
        }
    }

    async fn search(&self, prefix: Option<&str>) -> Result<Vec<Ingredient>> {
        let pattern = prefix.map(|p| format!("{}%", escape_like(&p.to_lowercase())));
        match self.pool.backend() {
            Backend::Sqlite(pool) => search_ingredients_sqlite(pool, pattern).await,
            Backend::Mysql(pool) => search_ingredients_mysql(pool, pattern).await,
        }
    }
}

/// Escape LIKE wildcards using `!` as the escape character
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '!') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

fn search_sql(filtered: bool) -> &'static str {
    if filtered {
        "SELECT id, name, measurement_unit FROM ingredients WHERE LOWER(name) LIKE ? ESCAPE '!' ORDER BY name, id"
    } else {
        "SELECT id, name, measurement_unit FROM ingredients ORDER BY name, id"
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_ingredients_by_ids_sqlite(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<Ingredient>> {
    let sql = format!(
        "SELECT id, name, measurement_unit FROM ingredients WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to get ingredients by ids")?;
    Ok(rows.iter().map(row_to_ingredient_sqlite).collect())
}

async fn search_ingredients_sqlite(pool: &SqlitePool, pattern: Option<String>) -> Result<Vec<Ingredient>> {
    let mut query = sqlx::query(search_sql(pattern.is_some()));
    if let Some(pattern) = pattern {
        query = query.bind(pattern);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to search ingredients")?;
    Ok(rows.iter().map(row_to_ingredient_sqlite).collect())
}

fn row_to_ingredient_sqlite(row: &sqlx::sqlite::SqliteRow) -> Ingredient {
    Ingredient {
        id: row.get("id"),
        name: row.get("name"),
        measurement_unit: row.get("measurement_unit"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_ingredients_by_ids_mysql(pool: &MySqlPool, ids: &[i64]) -> Result<Vec<Ingredient>> {
    let sql = format!(
        "SELECT id, name, measurement_unit FROM ingredients WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to get ingredients by ids")?;
    Ok(rows.iter().map(row_to_ingredient_mysql).collect())
}

async fn search_ingredients_mysql(pool: &MySqlPool, pattern: Option<String>) -> Result<Vec<Ingredient>> {
    let mut query = sqlx::query(search_sql(pattern.is_some()));
    if let Some(pattern) = pattern {
        query = query.bind(pattern);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to search ingredients")?;
    Ok(rows.iter().map(row_to_ingredient_mysql).collect())
}

fn row_to_ingredient_mysql(row: &sqlx::mysql::MySqlRow) -> Ingredient {
    Ingredient {
        id: row.get("id"),
        name: row.get("name"),
        measurement_unit: row.get("measurement_unit"),
    }
}
