//! Per-user recipe marks: favorites and the shopping cart
//!
//! Both are (recipe, user) pairs stored in their own table with identical
//! shape, so they share one repository keyed by [`RecipeMark`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of per-user recipe mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeMark {
    Favorite,
    ShoppingCart,
}

impl RecipeMark {
    pub const ALL: [RecipeMark; 2] = [RecipeMark::Favorite, RecipeMark::ShoppingCart];

    /// Table holding this mark's rows
    pub fn table(&self) -> &'static str {
        match self {
            RecipeMark::Favorite => "recipe_favorites",
            RecipeMark::ShoppingCart => "shopping_cart",
        }
    }
}

impl fmt::Display for RecipeMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipeMark::Favorite => write!(f, "favorites"),
            RecipeMark::ShoppingCart => write!(f, "shopping cart"),
        }
    }
}

/// Ingredient line as it appears in a shopping cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: f64,
}

impl IngredientLine {
    pub fn new(name: impl Into<String>, measurement_unit: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            measurement_unit: measurement_unit.into(),
            amount,
        }
    }
}

/// One recipe in a user's cart, in the order it was added
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartEntry {
    /// Cart row id
    pub id: i64,
    pub recipe_name: String,
    pub lines: Vec<IngredientLine>,
}

impl CartEntry {
    pub fn new(id: i64, recipe_name: impl Into<String>, lines: Vec<IngredientLine>) -> Self {
        Self {
            id,
            recipe_name: recipe_name.into(),
            lines,
        }
    }
}
