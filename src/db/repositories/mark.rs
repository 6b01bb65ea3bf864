//! Recipe mark repository
//!
//! Favorites and the shopping cart share one shape, `(recipe_id, user_id)`
//! unique per pair, so one repository serves both; the table is chosen by
//! [`RecipeMark::table`].

use super::placeholders;
use crate::db::{Backend, DynDatabasePool};
use crate::models::{CartEntry, IngredientLine, RecipeMark};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Recipe mark repository trait
#[async_trait]
pub trait MarkRepository: Send + Sync {
    /// Mark a recipe. Returns false if the mark already existed.
    async fn add(&self, mark: RecipeMark, user_id: i64, recipe_id: i64) -> Result<bool>;

    /// Unmark a recipe. Returns false if there was no such mark.
    async fn remove(&self, mark: RecipeMark, user_id: i64, recipe_id: i64) -> Result<bool>;

    /// Subset of `recipe_ids` the user has marked
    async fn marked_recipe_ids(
        &self,
        mark: RecipeMark,
        user_id: i64,
        recipe_ids: &[i64],
    ) -> Result<HashSet<i64>>;

    /// The user's cart in the order recipes were added, with ingredient lines
    async fn cart_entries(&self, user_id: i64) -> Result<Vec<CartEntry>>;

    /// Remove the given cart entries of the user, returning how many were
    /// removed. Entries added after they were loaded stay in the cart.
    async fn clear_cart(&self, user_id: i64, entry_ids: &[i64]) -> Result<u64>;
}

/// SQLx-based mark repository implementation
pub struct SqlxMarkRepository {
    pool: DynDatabasePool,
}

impl SqlxMarkRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MarkRepository> {
        Arc::new(Self::new(pool))
    }
}

/// Flat row of the cart query, one per (cart entry, ingredient line)
struct CartRow {
    entry_id: i64,
    recipe_name: String,
    line: Option<IngredientLine>,
}

const CART_SQL: &str = r#"
    SELECT sc.id AS entry_id, r.name AS recipe_name,
           i.name AS ingredient_name, i.measurement_unit, ri.amount
    FROM shopping_cart sc
    INNER JOIN recipes r ON r.id = sc.recipe_id
    LEFT JOIN recipe_ingredients ri ON ri.recipe_id = r.id
    LEFT JOIN ingredients i ON i.id = ri.ingredient_id
    WHERE sc.user_id = ?
    ORDER BY sc.id, ri.id
"#;

/// Group flat cart rows into entries, keeping row order
fn group_cart_rows(rows: Vec<CartRow>) -> Vec<CartEntry> {
    let mut entries: Vec<CartEntry> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        let slot = *index.entry(row.entry_id).or_insert_with(|| {
            entries.push(CartEntry::new(row.entry_id, row.recipe_name.clone(), Vec::new()));
            entries.len() - 1
        });
        if let Some(line) = row.line {
            entries[slot].lines.push(line);
        }
    }

    entries
}

#[async_trait]
impl MarkRepository for SqlxMarkRepository {
    async fn add(&self, mark: RecipeMark, user_id: i64, recipe_id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let sql = format!(
                    "INSERT OR IGNORE INTO {} (recipe_id, user_id) VALUES (?, ?)",
                    mark.table()
                );
                sqlx::query(&sql)
                    .bind(recipe_id)
                    .bind(user_id)
                    .execute(pool)
                    .await
                    .with_context(|| format!("Failed to add recipe to {}", mark))?
                    .rows_affected()
            }
            Backend::Mysql(pool) => {
                let sql = format!(
                    "INSERT IGNORE INTO {} (recipe_id, user_id) VALUES (?, ?)",
                    mark.table()
                );
                sqlx::query(&sql)
                    .bind(recipe_id)
                    .bind(user_id)
                    .execute(pool)
                    .await
                    .with_context(|| format!("Failed to add recipe to {}", mark))?
                    .rows_affected()
            }
        };
        Ok(affected > 0)
    }

    async fn remove(&self, mark: RecipeMark, user_id: i64, recipe_id: i64) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE recipe_id = ? AND user_id = ?",
            mark.table()
        );
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(recipe_id)
                .bind(user_id)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to remove recipe from {}", mark))?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(recipe_id)
                .bind(user_id)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to remove recipe from {}", mark))?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn marked_recipe_ids(
        &self,
        mark: RecipeMark,
        user_id: i64,
        recipe_ids: &[i64],
    ) -> Result<HashSet<i64>> {
        if recipe_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let sql = format!(
            "SELECT recipe_id FROM {} WHERE user_id = ? AND recipe_id IN ({})",
            mark.table(),
            placeholders(recipe_ids.len())
        );
        let ids = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(user_id);
                for id in recipe_ids {
                    query = query.bind(*id);
                }
                query.fetch_all(pool).await
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(user_id);
                for id in recipe_ids {
                    query = query.bind(*id);
                }
                query.fetch_all(pool).await
            }
        }
        .with_context(|| format!("Failed to look up {}", mark))?;

        Ok(ids.into_iter().collect())
    }

    async fn cart_entries(&self, user_id: i64) -> Result<Vec<CartEntry>> {
        let rows: Vec<CartRow> = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(CART_SQL)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to load shopping cart")?
                .iter()
                .map(|row| CartRow {
                    entry_id: row.get("entry_id"),
                    recipe_name: row.get("recipe_name"),
                    line: row
                        .get::<Option<String>, _>("ingredient_name")
                        .map(|name| IngredientLine {
                            name,
                            measurement_unit: row.get("measurement_unit"),
                            amount: row.get("amount"),
                        }),
                })
                .collect(),
            Backend::Mysql(pool) => sqlx::query(CART_SQL)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to load shopping cart")?
                .iter()
                .map(|row| CartRow {
                    entry_id: row.get("entry_id"),
                    recipe_name: row.get("recipe_name"),
                    line: row
                        .get::<Option<String>, _>("ingredient_name")
                        .map(|name| IngredientLine {
                            name,
                            measurement_unit: row.get("measurement_unit"),
                            amount: row.get("amount"),
                        }),
                })
                .collect(),
        };

        Ok(group_cart_rows(rows))
    }

    async fn clear_cart(&self, user_id: i64, entry_ids: &[i64]) -> Result<u64> {
        if entry_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM shopping_cart WHERE user_id = ? AND id IN ({})",
            placeholders(entry_ids.len())
        );
        let removed = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(&sql).bind(user_id);
                for id in entry_ids {
                    query = query.bind(*id);
                }
                query.execute(pool).await.map(|r| r.rows_affected())
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query(&sql).bind(user_id);
                for id in entry_ids {
                    query = query.bind(*id);
                }
                query.execute(pool).await.map(|r| r.rows_affected())
            }
        }
        .context("Failed to clear shopping cart")?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        IngredientRepository, RecipeRepository, SqlxIngredientRepository, SqlxRecipeRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateIngredientInput, CreateRecipeInput, IngredientAmount, User};

    struct Fixture {
        repo: SqlxMarkRepository,
        user: i64,
        omelette: i64,
        pancakes: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "u@example.com".to_string(),
                "u".to_string(),
                "U".to_string(),
                "U".to_string(),
                "hash".to_string(),
            ))
            .await
            .unwrap();

        let ingredients = SqlxIngredientRepository::new(pool.clone());
        let eggs = ingredients.create(&CreateIngredientInput::new("eggs", "pcs")).await.unwrap();
        let milk = ingredients.create(&CreateIngredientInput::new("milk", "ml")).await.unwrap();
        let flour = ingredients.create(&CreateIngredientInput::new("flour", "g")).await.unwrap();

        let recipes = SqlxRecipeRepository::new(pool.clone());
        let make = |name: &str, lines: Vec<(i64, f64)>| CreateRecipeInput {
            name: name.to_string(),
            text: "text".to_string(),
            cooking_time: 5,
            image: "recipes/x.png".to_string(),
            tags: vec![],
            ingredients: lines
                .into_iter()
                .map(|(id, amount)| IngredientAmount { id, amount })
                .collect(),
        };
        let omelette = recipes
            .create(user.id, &make("Omelette", vec![(eggs.id, 2.0), (milk.id, 50.0)]))
            .await
            .unwrap();
        let pancakes = recipes
            .create(user.id, &make("Pancakes", vec![(flour.id, 200.0), (milk.id, 100.0)]))
            .await
            .unwrap();

        Fixture {
            repo: SqlxMarkRepository::new(pool),
            user: user.id,
            omelette: omelette.id,
            pancakes: pancakes.id,
        }
    }

    #[tokio::test]
    async fn test_add_is_unique() {
        let f = setup().await;

        assert!(f.repo.add(RecipeMark::Favorite, f.user, f.omelette).await.unwrap());
        assert!(!f.repo.add(RecipeMark::Favorite, f.user, f.omelette).await.unwrap());
        // Same recipe in the other mark kind is independent
        assert!(f.repo.add(RecipeMark::ShoppingCart, f.user, f.omelette).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove() {
        let f = setup().await;
        f.repo.add(RecipeMark::Favorite, f.user, f.omelette).await.unwrap();

        assert!(f.repo.remove(RecipeMark::Favorite, f.user, f.omelette).await.unwrap());
        assert!(!f.repo.remove(RecipeMark::Favorite, f.user, f.omelette).await.unwrap());
    }

    #[tokio::test]
    async fn test_marked_recipe_ids() {
        let f = setup().await;
        f.repo.add(RecipeMark::ShoppingCart, f.user, f.pancakes).await.unwrap();

        let carted = f
            .repo
            .marked_recipe_ids(RecipeMark::ShoppingCart, f.user, &[f.omelette, f.pancakes])
            .await
            .unwrap();
        assert_eq!(carted, HashSet::from([f.pancakes]));

        let favorited = f
            .repo
            .marked_recipe_ids(RecipeMark::Favorite, f.user, &[f.omelette, f.pancakes])
            .await
            .unwrap();
        assert!(favorited.is_empty());

        assert!(f
            .repo
            .marked_recipe_ids(RecipeMark::ShoppingCart, f.user, &[])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_cart_entries_in_encounter_order() {
        let f = setup().await;
        f.repo.add(RecipeMark::ShoppingCart, f.user, f.pancakes).await.unwrap();
        f.repo.add(RecipeMark::ShoppingCart, f.user, f.omelette).await.unwrap();

        let entries = f.repo.cart_entries(f.user).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].recipe_name, "Pancakes");
        assert_eq!(
            entries[0].lines,
            vec![IngredientLine::new("flour", "g", 200.0), IngredientLine::new("milk", "ml", 100.0)]
        );
        assert_eq!(entries[1].recipe_name, "Omelette");
        assert_eq!(entries[1].lines.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_cart() {
        let f = setup().await;
        f.repo.add(RecipeMark::ShoppingCart, f.user, f.pancakes).await.unwrap();
        f.repo.add(RecipeMark::ShoppingCart, f.user, f.omelette).await.unwrap();
        f.repo.add(RecipeMark::Favorite, f.user, f.omelette).await.unwrap();

        let ids: Vec<i64> = f.repo.cart_entries(f.user).await.unwrap().iter().map(|e| e.id).collect();

        assert_eq!(f.repo.clear_cart(f.user, &ids).await.unwrap(), 2);
        assert!(f.repo.cart_entries(f.user).await.unwrap().is_empty());
        assert_eq!(f.repo.clear_cart(f.user, &[]).await.unwrap(), 0);
        // Favorites are untouched
        let favorited = f
            .repo
            .marked_recipe_ids(RecipeMark::Favorite, f.user, &[f.omelette])
            .await
            .unwrap();
        assert_eq!(favorited.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_cart_keeps_entries_not_listed() {
        let f = setup().await;
        f.repo.add(RecipeMark::ShoppingCart, f.user, f.pancakes).await.unwrap();
        let loaded: Vec<i64> = f.repo.cart_entries(f.user).await.unwrap().iter().map(|e| e.id).collect();
        f.repo.add(RecipeMark::ShoppingCart, f.user, f.omelette).await.unwrap();

        assert_eq!(f.repo.clear_cart(f.user, &loaded).await.unwrap(), 1);

        let left = f.repo.cart_entries(f.user).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].recipe_name, "Omelette");
    }

    #[test]
    fn test_group_cart_rows_keeps_empty_recipes() {
        let rows = vec![
            CartRow { entry_id: 4, recipe_name: "Tea".to_string(), line: None },
            CartRow {
                entry_id: 7,
                recipe_name: "Toast".to_string(),
                line: Some(IngredientLine::new("bread", "slice", 2.0)),
            },
        ];

        let entries = group_cart_rows(rows);

        assert_eq!(entries.len(), 2);
        assert_eq!((entries[0].id, entries[1].id), (4, 7));
        assert!(entries[0].lines.is_empty());
        assert_eq!(entries[1].lines.len(), 1);
    }
}
