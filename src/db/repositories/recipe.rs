//! Recipe repository
//!
//! Database operations for recipes and their ingredient/tag link rows.
//!
//! This module provides:
//! - `RecipeRepository` trait defining the interface for recipe data access
//! - `SqlxRecipeRepository` implementing the trait for SQLite and MySQL
//!
//! Writes that touch the recipe row and its link rows run in one transaction.
//! Listing filters are compiled to SQL once ([`FilterSql`]) and bound per driver.

use super::placeholders;
use crate::db::{Backend, DynDatabasePool};
use crate::models::{
    CreateRecipeInput, IngredientAmount, Recipe, RecipeFilter, RecipeIngredient,
    UpdateRecipeInput,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::mysql::{MySqlArguments, MySqlConnection};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnection};
use sqlx::{MySql, MySqlPool, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

const RECIPE_COLUMNS: &str =
    "r.id, r.author_id, r.name, r.text, r.cooking_time, r.image, r.created_at";

/// Recipe repository trait
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// Create a recipe with its tags and ingredient lines
    async fn create(&self, author_id: i64, input: &CreateRecipeInput) -> Result<Recipe>;

    /// Get recipe by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Recipe>>;

    /// Apply a partial update; present tag/ingredient sets replace the old ones
    async fn update(&self, id: i64, input: &UpdateRecipeInput) -> Result<Recipe>;

    /// Delete a recipe (link rows cascade). Returns false if it did not exist.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// One page of recipes matching `filter`, ordered by name, with the total count
    async fn list(&self, filter: &RecipeFilter, limit: i64, offset: i64) -> Result<(Vec<Recipe>, i64)>;

    /// Ingredient lines of every recipe in `recipe_ids`, in insertion order
    async fn ingredients_for(&self, recipe_ids: &[i64]) -> Result<Vec<RecipeIngredient>>;

    /// Number of recipes per author (authors without recipes are absent)
    async fn count_by_authors(&self, author_ids: &[i64]) -> Result<HashMap<i64, i64>>;

    /// All recipes written by any of `author_ids`, ordered by name
    async fn list_by_authors(&self, author_ids: &[i64]) -> Result<Vec<Recipe>>;
}

/// SQLx-based recipe repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxRecipeRepository {
    pool: DynDatabasePool,
}

impl SqlxRecipeRepository {
    /// Create a new SQLx recipe repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RecipeRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl RecipeRepository for SqlxRecipeRepository {
    async fn create(&self, author_id: i64, input: &CreateRecipeInput) -> Result<Recipe> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => create_recipe_sqlite(pool, author_id, input).await?,
            Backend::Mysql(pool) => create_recipe_mysql(pool, author_id, input).await?,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Recipe not found after create"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Recipe>> {
        let sql = format!("SELECT {} FROM recipes r WHERE r.id = ?", RECIPE_COLUMNS);
        let recipe = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get recipe by ID")?
                .as_ref()
                .map(row_to_recipe_sqlite),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get recipe by ID")?
                .as_ref()
                .map(row_to_recipe_mysql),
        };
        Ok(recipe)
    }

    async fn update(&self, id: i64, input: &UpdateRecipeInput) -> Result<Recipe> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_recipe_sqlite(pool, id, input).await?,
            Backend::Mysql(pool) => update_recipe_mysql(pool, id, input).await?,
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Recipe not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM recipes WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete recipe")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete recipe")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, filter: &RecipeFilter, limit: i64, offset: i64) -> Result<(Vec<Recipe>, i64)> {
        let filter_sql = FilterSql::compile(filter);
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_recipes_sqlite(pool, &filter_sql, limit, offset).await,
            Backend::Mysql(pool) => list_recipes_mysql(pool, &filter_sql, limit, offset).await,
        }
    }

    async fn ingredients_for(&self, recipe_ids: &[i64]) -> Result<Vec<RecipeIngredient>> {
        if recipe_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id IN ({})
            ORDER BY ri.id
            "#,
            placeholders(recipe_ids.len())
        );
        let lines = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(&sql);
                for id in recipe_ids {
                    query = query.bind(*id);
                }
                query
                    .fetch_all(pool)
                    .await
                    .context("Failed to load recipe ingredients")?
                    .iter()
                    .map(|row| RecipeIngredient {
                        recipe_id: row.get("recipe_id"),
                        id: row.get("id"),
                        name: row.get("name"),
                        measurement_unit: row.get("measurement_unit"),
                        amount: row.get("amount"),
                    })
                    .collect()
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query(&sql);
                for id in recipe_ids {
                    query = query.bind(*id);
                }
                query
                    .fetch_all(pool)
                    .await
                    .context("Failed to load recipe ingredients")?
                    .iter()
                    .map(|row| RecipeIngredient {
                        recipe_id: row.get("recipe_id"),
                        id: row.get("id"),
                        name: row.get("name"),
                        measurement_unit: row.get("measurement_unit"),
                        amount: row.get("amount"),
                    })
                    .collect()
            }
        };
        Ok(lines)
    }

    async fn count_by_authors(&self, author_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        if author_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT author_id, COUNT(*) AS recipes_count FROM recipes WHERE author_id IN ({}) GROUP BY author_id",
            placeholders(author_ids.len())
        );
        let counts = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(&sql);
                for id in author_ids {
                    query = query.bind(*id);
                }
                query
                    .fetch_all(pool)
                    .await
                    .context("Failed to count recipes by author")?
                    .iter()
                    .map(|row| (row.get("author_id"), row.get("recipes_count")))
                    .collect()
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query(&sql);
                for id in author_ids {
                    query = query.bind(*id);
                }
                query
                    .fetch_all(pool)
                    .await
                    .context("Failed to count recipes by author")?
                    .iter()
                    .map(|row| (row.get("author_id"), row.get("recipes_count")))
                    .collect()
            }
        };
        Ok(counts)
    }

    async fn list_by_authors(&self, author_ids: &[i64]) -> Result<Vec<Recipe>> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM recipes r WHERE r.author_id IN ({}) ORDER BY r.name, r.id",
            RECIPE_COLUMNS,
            placeholders(author_ids.len())
        );
        let recipes = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(&sql);
                for id in author_ids {
                    query = query.bind(*id);
                }
                query
                    .fetch_all(pool)
                    .await
                    .context("Failed to list recipes by author")?
                    .iter()
                    .map(row_to_recipe_sqlite)
                    .collect()
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query(&sql);
                for id in author_ids {
                    query = query.bind(*id);
                }
                query
                    .fetch_all(pool)
                    .await
                    .context("Failed to list recipes by author")?
                    .iter()
                    .map(row_to_recipe_mysql)
                    .collect()
            }
        };
        Ok(recipes)
    }
}

// ============================================================================
// Dynamic SQL
// ============================================================================

/// A value bound to a `?` placeholder of dynamically built SQL
#[derive(Debug, Clone, PartialEq)]
enum BindValue {
    Int(i64),
    Text(String),
}

/// Compiled WHERE clause of a recipe listing
#[derive(Debug, Clone, PartialEq)]
struct FilterSql {
    clause: String,
    binds: Vec<BindValue>,
}

impl FilterSql {
    fn compile(filter: &RecipeFilter) -> Self {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();

        if let Some(author_id) = filter.author_id {
            conditions.push("r.author_id = ?".to_string());
            binds.push(BindValue::Int(author_id));
        }

        if !filter.tag_slugs.is_empty() {
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND LOWER(t.slug) IN ({}))",
                placeholders(filter.tag_slugs.len())
            ));
            binds.extend(
                filter
                    .tag_slugs
                    .iter()
                    .map(|slug| BindValue::Text(slug.to_lowercase())),
            );
        }

        for mark in &filter.marks {
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM {} m WHERE m.recipe_id = r.id AND m.user_id = ?)",
                mark.mark.table()
            ));
            binds.push(BindValue::Int(mark.user_id));
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        Self { clause, binds }
    }
}

fn bind_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    binds: &[BindValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in binds {
        query = match value {
            BindValue::Int(v) => query.bind(*v),
            BindValue::Text(v) => query.bind(v.clone()),
        };
    }
    query
}

fn bind_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    binds: &[BindValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in binds {
        query = match value {
            BindValue::Int(v) => query.bind(*v),
            BindValue::Text(v) => query.bind(v.clone()),
        };
    }
    query
}

/// SET clause and binds of a partial row update, or `None` when no column changes
fn update_set(input: &UpdateRecipeInput) -> Option<(String, Vec<BindValue>)> {
    let mut sets = Vec::new();
    let mut binds = Vec::new();

    if let Some(name) = &input.name {
        sets.push("name = ?");
        binds.push(BindValue::Text(name.clone()));
    }
    if let Some(text) = &input.text {
        sets.push("text = ?");
        binds.push(BindValue::Text(text.clone()));
    }
    if let Some(cooking_time) = input.cooking_time {
        sets.push("cooking_time = ?");
        binds.push(BindValue::Int(cooking_time));
    }
    if let Some(image) = &input.image {
        sets.push("image = ?");
        binds.push(BindValue::Text(image.clone()));
    }

    if sets.is_empty() {
        None
    } else {
        Some((sets.join(", "), binds))
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_recipe_sqlite(pool: &SqlitePool, author_id: i64, input: &CreateRecipeInput) -> Result<i64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(
        r#"
        INSERT INTO recipes (author_id, name, text, cooking_time, image, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(author_id)
    .bind(&input.name)
    .bind(&input.text)
    .bind(input.cooking_time)
    .bind(&input.image)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .context("Failed to create recipe")?
    .last_insert_rowid();

    replace_tags_sqlite(&mut tx, id, &input.tags).await?;
    replace_ingredients_sqlite(&mut tx, id, &input.ingredients).await?;

    tx.commit().await.context("Failed to commit recipe")?;
    Ok(id)
}

async fn update_recipe_sqlite(pool: &SqlitePool, id: i64, input: &UpdateRecipeInput) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    if let Some((sets, binds)) = update_set(input) {
        let sql = format!("UPDATE recipes SET {} WHERE id = ?", sets);
        bind_sqlite(sqlx::query(&sql), &binds)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to update recipe")?;
    }
    if let Some(tags) = &input.tags {
        replace_tags_sqlite(&mut tx, id, tags).await?;
    }
    if let Some(ingredients) = &input.ingredients {
        replace_ingredients_sqlite(&mut tx, id, ingredients).await?;
    }

    tx.commit().await.context("Failed to commit recipe update")?;
    Ok(())
}

async fn replace_tags_sqlite(conn: &mut SqliteConnection, recipe_id: i64, tags: &[i64]) -> Result<()> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = ?")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear recipe tags")?;

    for tag_id in tags {
        sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES (?, ?)")
            .bind(recipe_id)
            .bind(*tag_id)
            .execute(&mut *conn)
            .await
            .context("Failed to link recipe tag")?;
    }
    Ok(())
}

async fn replace_ingredients_sqlite(
    conn: &mut SqliteConnection,
    recipe_id: i64,
    ingredients: &[IngredientAmount],
) -> Result<()> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = ?")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear recipe ingredients")?;

    for line in ingredients {
        sqlx::query("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES (?, ?, ?)")
            .bind(recipe_id)
            .bind(line.id)
            .bind(line.amount)
            .execute(&mut *conn)
            .await
            .context("Failed to link recipe ingredient")?;
    }
    Ok(())
}

async fn list_recipes_sqlite(
    pool: &SqlitePool,
    filter: &FilterSql,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Recipe>, i64)> {
    let sql = format!(
        "SELECT {} FROM recipes r {} ORDER BY r.name, r.id LIMIT ? OFFSET ?",
        RECIPE_COLUMNS, filter.clause
    );
    let rows = bind_sqlite(sqlx::query(&sql), &filter.binds)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list recipes")?;

    let count_sql = format!("SELECT COUNT(*) AS total FROM recipes r {}", filter.clause);
    let total: i64 = bind_sqlite(sqlx::query(&count_sql), &filter.binds)
        .fetch_one(pool)
        .await
        .context("Failed to count recipes")?
        .get("total");

    Ok((rows.iter().map(row_to_recipe_sqlite).collect(), total))
}

fn row_to_recipe_sqlite(row: &sqlx::sqlite::SqliteRow) -> Recipe {
    Recipe {
        id: row.get("id"),
        author_id: row.get("author_id"),
        name: row.get("name"),
        text: row.get("text"),
        cooking_time: row.get("cooking_time"),
        image: row.get("image"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_recipe_mysql(pool: &MySqlPool, author_id: i64, input: &CreateRecipeInput) -> Result<i64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(
        r#"
        INSERT INTO recipes (author_id, name, text, cooking_time, image, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(author_id)
    .bind(&input.name)
    .bind(&input.text)
    .bind(input.cooking_time)
    .bind(&input.image)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .context("Failed to create recipe")?
    .last_insert_id() as i64;

    replace_tags_mysql(&mut tx, id, &input.tags).await?;
    replace_ingredients_mysql(&mut tx, id, &input.ingredients).await?;

    tx.commit().await.context("Failed to commit recipe")?;
    Ok(id)
}

async fn update_recipe_mysql(pool: &MySqlPool, id: i64, input: &UpdateRecipeInput) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    if let Some((sets, binds)) = update_set(input) {
        let sql = format!("UPDATE recipes SET {} WHERE id = ?", sets);
        bind_mysql(sqlx::query(&sql), &binds)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to update recipe")?;
    }
    if let Some(tags) = &input.tags {
        replace_tags_mysql(&mut tx, id, tags).await?;
    }
    if let Some(ingredients) = &input.ingredients {
        replace_ingredients_mysql(&mut tx, id, ingredients).await?;
    }

    tx.commit().await.context("Failed to commit recipe update")?;
    Ok(())
}

async fn replace_tags_mysql(conn: &mut MySqlConnection, recipe_id: i64, tags: &[i64]) -> Result<()> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = ?")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear recipe tags")?;

    for tag_id in tags {
        sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES (?, ?)")
            .bind(recipe_id)
            .bind(*tag_id)
            .execute(&mut *conn)
            .await
            .context("Failed to link recipe tag")?;
    }
    Ok(())
}

async fn replace_ingredients_mysql(
    conn: &mut MySqlConnection,
    recipe_id: i64,
    ingredients: &[IngredientAmount],
) -> Result<()> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = ?")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear recipe ingredients")?;

    for line in ingredients {
        sqlx::query("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES (?, ?, ?)")
            .bind(recipe_id)
            .bind(line.id)
            .bind(line.amount)
            .execute(&mut *conn)
            .await
            .context("Failed to link recipe ingredient")?;
    }
    Ok(())
}

async fn list_recipes_mysql(
    pool: &MySqlPool,
    filter: &FilterSql,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Recipe>, i64)> {
    let sql = format!(
        "SELECT {} FROM recipes r {} ORDER BY r.name, r.id LIMIT ? OFFSET ?",
        RECIPE_COLUMNS, filter.clause
    );
    let rows = bind_mysql(sqlx::query(&sql), &filter.binds)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list recipes")?;

    let count_sql = format!("SELECT COUNT(*) AS total FROM recipes r {}", filter.clause);
    let total: i64 = bind_mysql(sqlx::query(&count_sql), &filter.binds)
        .fetch_one(pool)
        .await
        .context("Failed to count recipes")?
        .get("total");

    Ok((rows.iter().map(row_to_recipe_mysql).collect(), total))
}

fn row_to_recipe_mysql(row: &sqlx::mysql::MySqlRow) -> Recipe {
    Recipe {
        id: row.get("id"),
        author_id: row.get("author_id"),
        name: row.get("name"),
        text: row.get("text"),
        cooking_time: row.get::<i32, _>("cooking_time") as i64,
        image: row.get("image"),
        created_at: row.get("created_at"),
    }
}
