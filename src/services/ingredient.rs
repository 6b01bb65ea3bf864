//! Ingredient service

use crate::db::repositories::IngredientRepository;
use crate::models::{CreateIngredientInput, Ingredient};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum IngredientServiceError {
    #[error("Ingredient not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct IngredientService {
    repo: Arc<dyn IngredientRepository>,
}

impl IngredientService {
    pub fn new(repo: Arc<dyn IngredientRepository>) -> Self {
        Self { repo }
    }

    /// Ingredients whose name starts with `name` (case-insensitive), ordered by name.
    /// A missing or blank prefix returns the whole catalogue.
    pub async fn search(&self, name: Option<&str>) -> Result<Vec<Ingredient>, IngredientServiceError> {
        let prefix = name.map(str::trim).filter(|p| !p.is_empty());
        let found = self
            .repo
            .search(prefix)
            .await
            .context("Failed to search ingredients")?;
        Ok(found)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Ingredient, IngredientServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get ingredient")?
            .ok_or(IngredientServiceError::NotFound)
    }

    pub async fn create(&self, input: CreateIngredientInput) -> Result<Ingredient, IngredientServiceError> {
        let input = CreateIngredientInput::new(input.name.trim(), input.measurement_unit.trim());
        if input.name.is_empty() || input.measurement_unit.is_empty() {
            return Err(IngredientServiceError::ValidationError(
                "Ingredient name and measurement unit are required".to_string(),
            ));
        }

        let ingredient = self
            .repo
            .create(&input)
            .await
            .context("Failed to create ingredient")?;
        tracing::debug!("Created ingredient {} ({})", ingredient.name, ingredient.measurement_unit);
        Ok(ingredient)
    }
}
