//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They are
//! responsible for:
//! - Implementing business rules and validation
//! - Enforcing ownership (only authors change their recipes)
//! - Combining repository results into response-ready shapes

pub mod annotation;
pub mod image;
pub mod ingredient;
pub mod mark;
pub mod password;
pub mod recipe;
pub mod shopping_list;
pub mod subscription;
pub mod tag;
pub mod user;

pub use annotation::{AnnotatedRecipe, RecipeAnnotator, RecipeFlags, Viewer};
pub use image::{ImageError, ImageStore};
pub use ingredient::{IngredientService, IngredientServiceError};
pub use mark::{MarkService, MarkServiceError};
pub use password::{hash_password, verify_password};
pub use recipe::{RecipeDetail, RecipeQuery, RecipeService, RecipeServiceError};
pub use shopping_list::ShoppingList;
pub use subscription::{AuthorCard, SubscriptionService, SubscriptionServiceError};
pub use tag::{TagService, TagServiceError};
pub use user::{UserService, UserServiceError};
