//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one aggregate.

pub mod ingredient;
pub mod mark;
pub mod recipe;
pub mod session;
pub mod subscription;
pub mod tag;
pub mod user;

pub use ingredient::{IngredientRepository, SqlxIngredientRepository};
pub use mark::{MarkRepository, SqlxMarkRepository};
pub use recipe::{RecipeRepository, SqlxRecipeRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use subscription::{SqlxSubscriptionRepository, SubscriptionRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Comma-separated `?` placeholders for an `IN (...)` list of `count` values
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::placeholders;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
