//! Recipe model
//!
//! A recipe belongs to its author and links a set of tags and a set of
//! ingredients, each ingredient with an amount in the ingredient's unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mark::RecipeMark;

/// Recipe entity as stored; tags and ingredient lines are loaded separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub text: String,
    /// Minutes, at least 1
    pub cooking_time: i64,
    /// Image path relative to the upload directory
    pub image: String,
    pub created_at: DateTime<Utc>,
}

/// Ingredient line of a recipe, joined with the ingredient's name and unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub recipe_id: i64,
    /// Ingredient id
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: f64,
}

/// Ingredient reference with amount, as written by a client
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IngredientAmount {
    pub id: i64,
    pub amount: f64,
}

/// Input for creating a recipe. `image` is the already stored relative path.
#[derive(Debug, Clone)]
pub struct CreateRecipeInput {
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
    pub image: String,
    pub tags: Vec<i64>,
    pub ingredients: Vec<IngredientAmount>,
}

/// Input for updating a recipe. Absent fields are left unchanged; present
/// `tags`/`ingredients` replace the whole set.
#[derive(Debug, Clone, Default)]
pub struct UpdateRecipeInput {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
    pub image: Option<String>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<IngredientAmount>>,
}

impl UpdateRecipeInput {
    /// Check if any column of the recipe row itself changes
    pub fn touches_row(&self) -> bool {
        self.name.is_some()
            || self.text.is_some()
            || self.cooking_time.is_some()
            || self.image.is_some()
    }
}

/// Restrict a listing to recipes a user has marked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkFilter {
    pub mark: RecipeMark,
    pub user_id: i64,
}

/// Repository-level listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author_id: Option<i64>,
    /// Any-of, compared case-insensitively
    pub tag_slugs: Vec<String>,
    pub marks: Vec<MarkFilter>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_touches_row() {
        assert!(!UpdateRecipeInput::default().touches_row());

        let tags_only = UpdateRecipeInput {
            tags: Some(vec![1]),
            ..Default::default()
        };
        assert!(!tags_only.touches_row());

        let renamed = UpdateRecipeInput {
            name: Some("Borscht".to_string()),
            ..Default::default()
        };
        assert!(renamed.touches_row());
    }
}
