//! Recipe API endpoints
//!
//! - GET /api/recipes - List recipes (paginated, filterable)
//! - POST /api/recipes - Create recipe
//! - GET /api/recipes/{id} - Single recipe
//! - PATCH /api/recipes/{id} - Update recipe (author only)
//! - DELETE /api/recipes/{id} - Delete recipe (author only)
//! - POST/DELETE /api/recipes/{id}/favorite
//! - POST/DELETE /api/recipes/{id}/shopping_cart
//! - GET /api/recipes/download_shopping_cart - Plain-text shopping list
//!
//! Listing filters: `author`, repeated `tags` (slugs, any-of),
//! `is_favorited` and `is_in_shopping_cart` (`1`/`0`), `limit`, `offset`.

use axum::{
    extract::{OriginalUri, Path, RawQuery, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{parse_query_pairs, LimitOffsetQuery, Paginated};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser};
use crate::api::responses::{RecipeResponse, ShortRecipeResponse};
use crate::models::{CreateRecipeInput, IngredientAmount, RecipeMark, UpdateRecipeInput};
use crate::services::RecipeQuery;

const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

/// Request body for creating a recipe
#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<i64>,
    /// Base64 data URI
    pub image: String,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
}

/// Request body for a partial update
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRecipeRequest {
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<i64>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
}

/// Build public recipe routes (session optional)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_recipes))
        .route("/{id}", get(get_recipe))
}

/// Build protected recipe routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_recipe))
        .route("/download_shopping_cart", get(download_shopping_cart))
        .route(
            "/{id}",
            patch(update_recipe).delete(delete_recipe),
        )
        .route("/{id}/favorite", post(add_favorite).delete(remove_favorite))
        .route(
            "/{id}/shopping_cart",
            post(add_to_cart).delete(remove_from_cart),
        )
}

/// Split a raw query string into listing filters and pagination
fn parse_list_query(raw: Option<&str>) -> Result<(RecipeQuery, LimitOffsetQuery), ApiError> {
    let mut query = RecipeQuery::default();
    let mut page = LimitOffsetQuery::default();

    for (key, value) in parse_query_pairs(raw) {
        match key.as_str() {
            "author" => query.author = Some(parse_number("author", &value)?),
            "tags" => query.tags.push(value),
            "is_favorited" => query.is_favorited = Some(value),
            "is_in_shopping_cart" => query.is_in_shopping_cart = Some(value),
            "limit" => page.limit = Some(parse_number("limit", &value)?),
            "offset" => page.offset = Some(parse_number("offset", &value)?),
            _ => {}
        }
    }

    Ok((query, page))
}

fn parse_number(field: &str, value: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::validation_error(format!("{} must be an integer", field)))
}

/// GET /api/recipes
async fn list_recipes(
    State(state): State<AppState>,
    viewer: OptionalUser,
    OriginalUri(uri): OriginalUri,
    RawQuery(raw): RawQuery,
) -> Result<Json<Paginated<RecipeResponse>>, ApiError> {
    let (query, page) = parse_list_query(raw.as_deref())?;
    let params = page.resolve(&state.pagination);

    let result = state
        .recipe_service
        .list(viewer.viewer(), &query, params)
        .await?
        .map(|detail| RecipeResponse::new(detail, &state.images));

    Ok(Json(Paginated::from_page(result, params, &uri)))
}

/// GET /api/recipes/{id}
async fn get_recipe(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Json<RecipeResponse>, ApiError> {
    let detail = state.recipe_service.get(viewer.viewer(), id).await?;
    Ok(Json(RecipeResponse::new(detail, &state.images)))
}

/// POST /api/recipes
async fn create_recipe(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateRecipeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = CreateRecipeInput {
        name: body.name,
        text: body.text,
        cooking_time: body.cooking_time,
        image: body.image,
        tags: body.tags,
        ingredients: body.ingredients,
    };
    let detail = state.recipe_service.create(user.0.id, input).await?;

    Ok((StatusCode::CREATED, Json(RecipeResponse::new(detail, &state.images))))
}

/// PATCH /api/recipes/{id}
async fn update_recipe(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateRecipeRequest>,
) -> Result<Json<RecipeResponse>, ApiError> {
    let input = UpdateRecipeInput {
        name: body.name,
        text: body.text,
        cooking_time: body.cooking_time,
        image: body.image,
        tags: body.tags,
        ingredients: body.ingredients,
    };
    let detail = state.recipe_service.update(user.0.id, id, input).await?;

    Ok(Json(RecipeResponse::new(detail, &state.images)))
}

/// DELETE /api/recipes/{id}
async fn delete_recipe(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.recipe_service.delete(user.0.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_mark(
    state: &AppState,
    mark: RecipeMark,
    user_id: i64,
    recipe_id: i64,
) -> Result<(StatusCode, Json<ShortRecipeResponse>), ApiError> {
    let recipe = state.mark_service.add(mark, user_id, recipe_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ShortRecipeResponse::new(recipe, &state.images)),
    ))
}

async fn remove_mark(
    state: &AppState,
    mark: RecipeMark,
    user_id: i64,
    recipe_id: i64,
) -> Result<StatusCode, ApiError> {
    state.mark_service.remove(mark, user_id, recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/recipes/{id}/favorite
async fn add_favorite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    add_mark(&state, RecipeMark::Favorite, user.0.id, id).await
}

/// DELETE /api/recipes/{id}/favorite
async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    remove_mark(&state, RecipeMark::Favorite, user.0.id, id).await
}

/// POST /api/recipes/{id}/shopping_cart
async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    add_mark(&state, RecipeMark::ShoppingCart, user.0.id, id).await
}

/// DELETE /api/recipes/{id}/shopping_cart
async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    remove_mark(&state, RecipeMark::ShoppingCart, user.0.id, id).await
}

/// GET /api/recipes/download_shopping_cart
///
/// Returns the aggregated list as a text attachment and empties the cart.
async fn download_shopping_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let text = state
        .mark_service
        .download_shopping_list(user.0.id)
        .await?
        .ok_or_else(|| ApiError::validation_error("Shopping cart is empty"))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", SHOPPING_LIST_FILENAME),
            ),
        ],
        text,
    ))
}
