//! Favorites and shopping cart
//!
//! Both are [`RecipeMark`] variants handled by the same code. Downloading
//! the shopping list consumes the cart: the downloaded entries are removed
//! only after the list has been rendered, and only those entries.

use crate::db::repositories::{MarkRepository, RecipeRepository};
use crate::models::{Recipe, RecipeMark};
use crate::services::shopping_list::ShoppingList;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum MarkServiceError {
    #[error("Recipe not found")]
    NotFound,

    #[error("Recipe is already in {0}")]
    AlreadyMarked(RecipeMark),

    #[error("Recipe is not in {0}")]
    NotMarked(RecipeMark),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct MarkService {
    marks: Arc<dyn MarkRepository>,
    recipes: Arc<dyn RecipeRepository>,
}

impl MarkService {
    pub fn new(marks: Arc<dyn MarkRepository>, recipes: Arc<dyn RecipeRepository>) -> Self {
        Self { marks, recipes }
    }

    /// Mark a recipe for the user, returning the recipe
    pub async fn add(&self, mark: RecipeMark, user_id: i64, recipe_id: i64) -> Result<Recipe, MarkServiceError> {
        let recipe = self.existing_recipe(recipe_id).await?;

        if !self
            .marks
            .add(mark, user_id, recipe_id)
            .await
            .with_context(|| format!("Failed to add recipe to {}", mark))?
        {
            return Err(MarkServiceError::AlreadyMarked(mark));
        }

        tracing::debug!("User {} added recipe {} to {}", user_id, recipe_id, mark);
        Ok(recipe)
    }

    pub async fn remove(&self, mark: RecipeMark, user_id: i64, recipe_id: i64) -> Result<(), MarkServiceError> {
        self.existing_recipe(recipe_id).await?;

        if !self
            .marks
            .remove(mark, user_id, recipe_id)
            .await
            .with_context(|| format!("Failed to remove recipe from {}", mark))?
        {
            return Err(MarkServiceError::NotMarked(mark));
        }

        tracing::debug!("User {} removed recipe {} from {}", user_id, recipe_id, mark);
        Ok(())
    }

    /// Render the user's shopping list and remove the rendered entries from
    /// the cart.
    ///
    /// Returns `None` for an empty cart, which is left as is.
    pub async fn download_shopping_list(&self, user_id: i64) -> Result<Option<String>, MarkServiceError> {
        let entries = self
            .marks
            .cart_entries(user_id)
            .await
            .context("Failed to load shopping cart")?;

        let list = ShoppingList::from_entries(&entries);
        if list.is_empty() {
            return Ok(None);
        }
        let text = list.to_text();

        let entry_ids: Vec<i64> = entries.iter().map(|entry| entry.id).collect();
        let cleared = self
            .marks
            .clear_cart(user_id, &entry_ids)
            .await
            .context("Failed to clear shopping cart")?;

        tracing::info!(
            "User {} downloaded shopping list for {} recipes; cart cleared ({} entries)",
            user_id,
            list.recipe_names.len(),
            cleared
        );
        Ok(Some(text))
    }

    async fn existing_recipe(&self, recipe_id: i64) -> Result<Recipe, MarkServiceError> {
        self.recipes
            .get_by_id(recipe_id)
            .await
            .context("Failed to get recipe")?
            .ok_or(MarkServiceError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        IngredientRepository, SqlxIngredientRepository, SqlxMarkRepository, SqlxRecipeRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CartEntry, CreateIngredientInput, CreateRecipeInput, IngredientAmount, User};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Cart repository wrapper that can add a recipe to the cart while the
    /// cart is being read, or fail the read
    struct InterleavedMarks {
        inner: Arc<dyn MarkRepository>,
        late_recipe: Option<i64>,
        fail_load: bool,
        clears: AtomicUsize,
    }

    impl InterleavedMarks {
        fn new(inner: Arc<dyn MarkRepository>) -> Self {
            Self { inner, late_recipe: None, fail_load: false, clears: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl MarkRepository for InterleavedMarks {
        async fn add(&self, mark: RecipeMark, user_id: i64, recipe_id: i64) -> anyhow::Result<bool> {
            self.inner.add(mark, user_id, recipe_id).await
        }

        async fn remove(&self, mark: RecipeMark, user_id: i64, recipe_id: i64) -> anyhow::Result<bool> {
            self.inner.remove(mark, user_id, recipe_id).await
        }

        async fn marked_recipe_ids(
            &self,
            mark: RecipeMark,
            user_id: i64,
            recipe_ids: &[i64],
        ) -> anyhow::Result<HashSet<i64>> {
            self.inner.marked_recipe_ids(mark, user_id, recipe_ids).await
        }

        async fn cart_entries(&self, user_id: i64) -> anyhow::Result<Vec<CartEntry>> {
            if self.fail_load {
                return Err(anyhow!("connection reset"));
            }
            let entries = self.inner.cart_entries(user_id).await?;
            if let Some(recipe_id) = self.late_recipe {
                self.inner.add(RecipeMark::ShoppingCart, user_id, recipe_id).await?;
            }
            Ok(entries)
        }

        async fn clear_cart(&self, user_id: i64, entry_ids: &[i64]) -> anyhow::Result<u64> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            self.inner.clear_cart(user_id, entry_ids).await
        }
    }

    struct Fixture {
        service: MarkService,
        marks: Arc<dyn MarkRepository>,
        recipes: Arc<dyn RecipeRepository>,
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
            .create(&User::new("cook@example.com".into(), "cook".into(), "C".into(), "K".into(), "h".into()))
            .await
            .unwrap();

        let ingredients = SqlxIngredientRepository::new(pool.clone());
        let eggs = ingredients.create(&CreateIngredientInput::new("eggs", "pcs")).await.unwrap();
        let milk = ingredients.create(&CreateIngredientInput::new("milk", "ml")).await.unwrap();
        let flour = ingredients.create(&CreateIngredientInput::new("flour", "g")).await.unwrap();

        let recipes = SqlxRecipeRepository::boxed(pool.clone());
        let recipe = |name: &str, lines: Vec<(i64, f64)>| CreateRecipeInput {
            name: name.to_string(),
            text: "Cook".to_string(),
            cooking_time: 5,
            image: format!("recipes/{}.png", name),
            tags: vec![],
            ingredients: lines.into_iter().map(|(id, amount)| IngredientAmount { id, amount }).collect(),
        };
        let omelette = recipes
            .create(user.id, &recipe("Omelette", vec![(eggs.id, 2.0), (milk.id, 50.0)]))
            .await
            .unwrap();
        let pancakes = recipes
            .create(user.id, &recipe("Pancakes", vec![(flour.id, 200.0), (milk.id, 100.0)]))
            .await
            .unwrap();

        let marks = SqlxMarkRepository::boxed(pool.clone());
        Fixture {
            service: MarkService::new(marks.clone(), recipes.clone()),
            marks,
            recipes,
            user: user.id,
            omelette: omelette.id,
            pancakes: pancakes.id,
        }
    }

    #[tokio::test]
    async fn test_add_and_remove_favorite() {
        let f = setup().await;

        let recipe = f.service.add(RecipeMark::Favorite, f.user, f.omelette).await.unwrap();
        assert_eq!(recipe.name, "Omelette");

        let again = f.service.add(RecipeMark::Favorite, f.user, f.omelette).await;
        assert!(matches!(again, Err(MarkServiceError::AlreadyMarked(RecipeMark::Favorite))));

        f.service.remove(RecipeMark::Favorite, f.user, f.omelette).await.unwrap();
        let again = f.service.remove(RecipeMark::Favorite, f.user, f.omelette).await;
        assert!(matches!(again, Err(MarkServiceError::NotMarked(RecipeMark::Favorite))));
    }

    #[tokio::test]
    async fn test_marks_are_independent() {
        let f = setup().await;

        f.service.add(RecipeMark::Favorite, f.user, f.omelette).await.unwrap();
        f.service.add(RecipeMark::ShoppingCart, f.user, f.omelette).await.unwrap();

        let cart = f.marks.marked_recipe_ids(RecipeMark::ShoppingCart, f.user, &[f.omelette]).await.unwrap();
        assert_eq!(cart, HashSet::from([f.omelette]));
    }

    #[tokio::test]
    async fn test_unknown_recipe() {
        let f = setup().await;

        assert!(matches!(
            f.service.add(RecipeMark::ShoppingCart, f.user, 999).await,
            Err(MarkServiceError::NotFound)
        ));
        assert!(matches!(
            f.service.remove(RecipeMark::ShoppingCart, f.user, 999).await,
            Err(MarkServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_download_aggregates_and_clears_cart() {
        let f = setup().await;
        f.service.add(RecipeMark::ShoppingCart, f.user, f.omelette).await.unwrap();
        f.service.add(RecipeMark::ShoppingCart, f.user, f.pancakes).await.unwrap();

        let text = f.service.download_shopping_list(f.user).await.unwrap().expect("cart has items");

        assert!(text.starts_with("Shopping list for: Omelette, Pancakes."));
        assert!(text.contains("eggs: 2 pcs"));
        assert!(text.contains("milk: 150 ml"));
        assert!(text.contains("flour: 200 g"));
        assert!(f.marks.cart_entries(f.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_empty_cart() {
        let f = setup().await;
        f.service.add(RecipeMark::Favorite, f.user, f.omelette).await.unwrap();

        assert!(f.service.download_shopping_list(f.user).await.unwrap().is_none());
        assert_eq!(
            f.marks.marked_recipe_ids(RecipeMark::Favorite, f.user, &[f.omelette]).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_download_keeps_entries_added_during_read() {
        let f = setup().await;
        f.marks.add(RecipeMark::ShoppingCart, f.user, f.omelette).await.unwrap();
        let marks = Arc::new(InterleavedMarks {
            late_recipe: Some(f.pancakes),
            ..InterleavedMarks::new(f.marks.clone())
        });
        let service = MarkService::new(marks.clone(), f.recipes.clone());

        let text = service.download_shopping_list(f.user).await.unwrap().expect("cart has items");

        assert!(text.starts_with("Shopping list for: Omelette."));
        assert!(!text.contains("flour"));
        let left = f.marks.cart_entries(f.user).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].recipe_name, "Pancakes");
    }

    #[tokio::test]
    async fn test_download_failure_leaves_cart() {
        let f = setup().await;
        f.marks.add(RecipeMark::ShoppingCart, f.user, f.omelette).await.unwrap();
        let marks = Arc::new(InterleavedMarks {
            fail_load: true,
            ..InterleavedMarks::new(f.marks.clone())
        });
        let service = MarkService::new(marks.clone(), f.recipes.clone());

        let result = service.download_shopping_list(f.user).await;

        assert!(matches!(result, Err(MarkServiceError::InternalError(_))));
        assert_eq!(marks.clears.load(Ordering::SeqCst), 0);
        assert_eq!(f.marks.cart_entries(f.user).await.unwrap().len(), 1);
    }
}
