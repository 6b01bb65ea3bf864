//! Shared API response types
//!
//! JSON representations of users, recipes and author cards. Image paths
//! are turned into public URLs here.

use serde::{Deserialize, Serialize};

use crate::models::{Ingredient, Recipe, RecipeIngredient, Tag, User};
use crate::services::{AuthorCard, ImageStore, RecipeDetail};

// ============================================================================
// Users
// ============================================================================

/// Public user profile
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserResponse {
    pub fn new(user: User, is_subscribed: bool) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

/// Registration response (no subscription flag)
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedUserResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for CreatedUserResponse {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

// ============================================================================
// Recipes
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeIngredientResponse {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: f64,
}

impl From<RecipeIngredient> for RecipeIngredientResponse {
    fn from(line: RecipeIngredient) -> Self {
        Self {
            id: line.id,
            name: line.name,
            measurement_unit: line.measurement_unit,
            amount: line.amount,
        }
    }
}

/// Full recipe as seen by the requesting user
#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
}

impl RecipeResponse {
    pub fn new(detail: RecipeDetail, images: &ImageStore) -> Self {
        Self {
            id: detail.recipe.id,
            tags: detail.tags,
            author: UserResponse::new(detail.author, detail.author_subscribed),
            ingredients: detail.ingredients.into_iter().map(Into::into).collect(),
            is_favorited: detail.flags.is_favorited,
            is_in_shopping_cart: detail.flags.is_in_shopping_cart,
            image: images.url(&detail.recipe.image),
            name: detail.recipe.name,
            text: detail.recipe.text,
            cooking_time: detail.recipe.cooking_time,
        }
    }
}

/// Compact recipe used in favorites, cart and subscription responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ShortRecipeResponse {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i64,
}

impl ShortRecipeResponse {
    pub fn new(recipe: Recipe, images: &ImageStore) -> Self {
        Self {
            id: recipe.id,
            image: images.url(&recipe.image),
            name: recipe.name,
            cooking_time: recipe.cooking_time,
        }
    }
}

/// Followed author with recipe preview
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorCardResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub recipes: Vec<ShortRecipeResponse>,
    pub recipes_count: i64,
}

impl AuthorCardResponse {
    pub fn new(card: AuthorCard, images: &ImageStore) -> Self {
        Self {
            user: UserResponse::new(card.author, true),
            recipes: card
                .recipes
                .into_iter()
                .map(|r| ShortRecipeResponse::new(r, images))
                .collect(),
            recipes_count: card.recipes_count,
        }
    }
}

/// Ingredient catalogue entry
pub type IngredientResponse = Ingredient;

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub auth_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use chrono::Utc;

    fn user() -> User {
        User {
            id: 4,
            email: "chef@example.com".to_string(),
            username: "chef".to_string(),
            first_name: "Julia".to_string(),
            last_name: "Child".to_string(),
            password_hash: "secret".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_author_card_flattens_user() {
        let images = ImageStore::new(UploadConfig::default());
        let card = AuthorCard {
            author: user(),
            recipes: vec![Recipe {
                id: 1,
                author_id: 4,
                name: "Boeuf".to_string(),
                text: "Braise".to_string(),
                cooking_time: 180,
                image: "recipes/boeuf.jpg".to_string(),
                created_at: Utc::now(),
            }],
            recipes_count: 7,
        };

        let json = serde_json::to_value(AuthorCardResponse::new(card, &images)).unwrap();

        assert_eq!(json["username"], "chef");
        assert_eq!(json["is_subscribed"], true);
        assert_eq!(json["recipes_count"], 7);
        assert_eq!(json["recipes"][0]["image"], "/media/recipes/boeuf.jpg");
        assert!(json.get("password_hash").is_none());
    }
}
