//! Tag API endpoints
//!
//! - GET /api/tags - All tags
//! - GET /api/tags/{id} - Single tag

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::Tag;

/// Build tag routes (read only, no auth required)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags))
        .route("/{id}", get(get_tag))
}

/// GET /api/tags
async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, ApiError> {
    let tags = state.tag_service.list().await?;
    Ok(Json(tags))
}

/// GET /api/tags/{id}
async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Tag>, ApiError> {
    let tag = state.tag_service.get_by_id(id).await?;
    Ok(Json(tag))
}
