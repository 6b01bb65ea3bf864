//! Ingredient API endpoints
//!
//! - GET /api/ingredients?name=<prefix> - Search the catalogue
//! - GET /api/ingredients/{id} - Single ingredient

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::IngredientResponse;

#[derive(Debug, Default, Deserialize)]
pub struct IngredientSearchQuery {
    /// Case-insensitive name prefix
    pub name: Option<String>,
}

/// Build ingredient routes (read only, no auth required)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(search_ingredients))
        .route("/{id}", get(get_ingredient))
}

/// GET /api/ingredients
async fn search_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientSearchQuery>,
) -> Result<Json<Vec<IngredientResponse>>, ApiError> {
    let ingredients = state
        .ingredient_service
        .search(query.name.as_deref())
        .await?;
    Ok(Json(ingredients))
}

/// GET /api/ingredients/{id}
async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<IngredientResponse>, ApiError> {
    let ingredient = state.ingredient_service.get_by_id(id).await?;
    Ok(Json(ingredient))
}
