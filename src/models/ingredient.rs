//! Ingredient model

use serde::{Deserialize, Serialize};

/// Reference ingredient with its measurement unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

/// Input for creating an ingredient
#[derive(Debug, Clone)]
pub struct CreateIngredientInput {
    pub name: String,
    pub measurement_unit: String,
}

impl CreateIngredientInput {
    pub fn new(name: impl Into<String>, measurement_unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            measurement_unit: measurement_unit.into(),
        }
    }
}
