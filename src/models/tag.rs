//! Tag model
//!
//! Tags are reference data used to group recipes (breakfast, lunch, ...).
//! Each carries a display color as a hex code.

use serde::{Deserialize, Serialize};

/// Tag entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// Tag name (unique)
    pub name: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    /// Hex color, `#RGB` or `#RRGGBB`
    pub color: String,
}

/// Input for creating a tag
#[derive(Debug, Clone)]
pub struct CreateTagInput {
    pub name: String,
    pub slug: String,
    pub color: String,
}

impl CreateTagInput {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            color: color.into(),
        }
    }
}

/// Tag attached to a particular recipe, as loaded for a batch of recipes
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeTag {
    pub recipe_id: i64,
    pub tag: Tag,
}
