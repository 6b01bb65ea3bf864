//! Tag repository
//!
//! Database operations for tags and the recipe-tag link table.
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL

use super::placeholders;
use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateTagInput, RecipeTag, Tag};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a new tag
    async fn create(&self, input: &CreateTagInput) -> Result<Tag>;

    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Get every tag whose id is in `ids`
    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Tag>>;

    /// List all tags ordered by name
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Check if a tag already uses this name or slug
    async fn name_or_slug_taken(&self, name: &str, slug: &str) -> Result<bool>;

    /// Tags of every recipe in `recipe_ids`, ordered by tag name
    async fn for_recipes(&self, recipe_ids: &[i64]) -> Result<Vec<RecipeTag>>;
}

/// SQLx-based tag repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, input: &CreateTagInput) -> Result<Tag> {
        let sql = "INSERT INTO tags (name, slug, color) VALUES (?, ?, ?)";
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&input.name)
                .bind(&input.slug)
                .bind(&input.color)
                .execute(pool)
                .await
                .context("Failed to create tag")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&input.name)
                .bind(&input.slug)
                .bind(&input.color)
                .execute(pool)
                .await
                .context("Failed to create tag")?
                .last_insert_id() as i64,
        };

        Ok(Tag {
            id,
            name: input.name.clone(),
            slug: input.slug.clone(),
            color: input.color.clone(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        let sql = "SELECT id, name, slug, color FROM tags WHERE id = ?";
        let tag = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get tag by ID")?
                .as_ref()
                .map(row_to_tag_sqlite),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get tag by ID")?
                .as_ref()
                .map(row_to_tag_mysql),
        };
        Ok(tag)
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Tag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_tags_by_ids_sqlite(pool, ids).await,
            Backend::Mysql(pool) => get_tags_by_ids_mysql(pool, ids).await,
        }
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        let sql = "SELECT id, name, slug, color FROM tags ORDER BY name, id";
        let tags = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .fetch_all(pool)
                .await
                .context("Failed to list tags")?
                .iter()
                .map(row_to_tag_sqlite)
                .collect(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .fetch_all(pool)
                .await
                .context("Failed to list tags")?
                .iter()
                .map(row_to_tag_mysql)
                .collect(),
        };
        Ok(tags)
    }

    async fn name_or_slug_taken(&self, name: &str, slug: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM tags WHERE name = ? OR slug = ?";
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query_scalar(sql)
                .bind(name)
                .bind(slug)
                .fetch_one(pool)
                .await
                .context("Failed to check tag uniqueness")?,
            Backend::Mysql(pool) => sqlx::query_scalar(sql)
                .bind(name)
                .bind(slug)
                .fetch_one(pool)
                .await
                .context("Failed to check tag uniqueness")?,
        };
        Ok(count > 0)
    }

    async fn for_recipes(&self, recipe_ids: &[i64]) -> Result<Vec<RecipeTag>> {
        if recipe_ids.is_empty() {
            return Ok(Vec::new());
        }
        match self.pool.backend() {
            Backend::Sqlite(pool) => tags_for_recipes_sqlite(pool, recipe_ids).await,
            Backend::Mysql(pool) => tags_for_recipes_mysql(pool, recipe_ids).await,
        }
    }
}

fn recipe_tags_sql(count: usize) -> String {
    format!(
        r#"
        SELECT rt.recipe_id, t.id, t.name, t.slug, t.color
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id IN ({})
        ORDER BY t.name, t.id
        "#,
        placeholders(count)
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_tags_by_ids_sqlite(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<Tag>> {
    let sql = format!(
        "SELECT id, name, slug, color FROM tags WHERE id IN ({}) ORDER BY name, id",
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(*id);
    }
    let rows = query.fetch_all(pool).await.context("Failed to get tags by ids")?;
    Ok(rows.iter().map(row_to_tag_sqlite).collect())
}

async fn tags_for_recipes_sqlite(pool: &SqlitePool, recipe_ids: &[i64]) -> Result<Vec<RecipeTag>> {
    let sql = recipe_tags_sql(recipe_ids.len());
    let mut query = sqlx::query(&sql);
    for id in recipe_ids {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to load recipe tags")?;

    Ok(rows
        .iter()
        .map(|row| RecipeTag {
            recipe_id: row.get("recipe_id"),
            tag: row_to_tag_sqlite(row),
        })
        .collect())
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        color: row.get("color"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_tags_by_ids_mysql(pool: &MySqlPool, ids: &[i64]) -> Result<Vec<Tag>> {
    let sql = format!(
        "SELECT id, name, slug, color FROM tags WHERE id IN ({}) ORDER BY name, id",
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(*id);
    }
    let rows = query.fetch_all(pool).await.context("Failed to get tags by ids")?;
    Ok(rows.iter().map(row_to_tag_mysql).collect())
}

async fn tags_for_recipes_mysql(pool: &MySqlPool, recipe_ids: &[i64]) -> Result<Vec<RecipeTag>> {
    let sql = recipe_tags_sql(recipe_ids.len());
    let mut query = sqlx::query(&sql);
    for id in recipe_ids {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to load recipe tags")?;

    Ok(rows
        .iter()
        .map(|row| RecipeTag {
            recipe_id: row.get("recipe_id"),
            tag: row_to_tag_mysql(row),
        })
        .collect())
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        color: row.get("color"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxTagRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxTagRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_and_get_tag() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo
            .create(&CreateTagInput::new("Breakfast", "breakfast", "#E26C2D"))
            .await
            .expect("Failed to create tag");
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().expect("Tag not found");
        assert_eq!(found, created);
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_ordered_by_name() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&CreateTagInput::new("Lunch", "lunch", "#49B64E")).await.unwrap();
        repo.create(&CreateTagInput::new("Breakfast", "breakfast", "#E26C2D")).await.unwrap();
        repo.create(&CreateTagInput::new("Dinner", "dinner", "#8775D2")).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Breakfast", "Dinner", "Lunch"]);
    }

    #[tokio::test]
    async fn test_name_or_slug_taken() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&CreateTagInput::new("Lunch", "lunch", "#49B64E")).await.unwrap();

        assert!(repo.name_or_slug_taken("Lunch", "other").await.unwrap());
        assert!(repo.name_or_slug_taken("Other", "lunch").await.unwrap());
        assert!(!repo.name_or_slug_taken("Supper", "supper").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected_by_schema() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&CreateTagInput::new("Lunch", "lunch", "#49B64E")).await.unwrap();

        let result = repo.create(&CreateTagInput::new("Lunch 2", "lunch", "#000")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_for_recipes() {
        let (pool, repo) = setup_test_repo().await;
        let lunch = repo.create(&CreateTagInput::new("Lunch", "lunch", "#49B64E")).await.unwrap();
        let dinner = repo.create(&CreateTagInput::new("Dinner", "dinner", "#8775D2")).await.unwrap();

        let sqlite = pool.as_sqlite().unwrap();
        let user_id = sqlx::query(
            "INSERT INTO users (email, username, first_name, last_name, password_hash) VALUES ('a@b.c', 'a', 'A', 'B', 'h')",
        )
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();
        let recipe_id = sqlx::query(
            "INSERT INTO recipes (author_id, name, text, cooking_time, image) VALUES (?, 'Soup', 'Boil', 30, 'recipes/soup.png')",
        )
        .bind(user_id)
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();
        for tag_id in [lunch.id, dinner.id] {
            sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES (?, ?)")
                .bind(recipe_id)
                .bind(tag_id)
                .execute(sqlite)
                .await
                .unwrap();
        }

        let tags = repo.for_recipes(&[recipe_id, 999]).await.unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().all(|t| t.recipe_id == recipe_id));
        assert_eq!(tags[0].tag.name, "Dinner");

        assert!(repo.for_recipes(&[]).await.unwrap().is_empty());
    }
}
