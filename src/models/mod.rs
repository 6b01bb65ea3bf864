//! Data models
//!
//! Plain data structures shared by repositories, services and the API:
//! - Database entities (User, Session, Ingredient, Tag, Recipe)
//! - Inputs for creating and updating them
//! - Recipe marks (favorites, shopping cart) and cart contents

mod ingredient;
mod mark;
mod pagination;
mod recipe;
mod session;
mod tag;
mod user;

pub use ingredient::{CreateIngredientInput, Ingredient};
pub use mark::{CartEntry, IngredientLine, RecipeMark};
pub use pagination::{ListParams, PagedResult};
pub use recipe::{
    CreateRecipeInput, IngredientAmount, MarkFilter, Recipe, RecipeFilter, RecipeIngredient,
    UpdateRecipeInput,
};
pub use session::Session;
pub use tag::{CreateTagInput, RecipeTag, Tag};
pub use user::{CreateUserInput, User};
