//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api`:
//! - Auth token endpoints
//! - User, profile and subscription endpoints
//! - Tag and ingredient reference data
//! - Recipe endpoints, favorites, shopping cart and its download
//!
//! Stored recipe images are served as static files under the configured
//! upload URL prefix.

pub mod auth;
pub mod common;
pub mod ingredients;
pub mod middleware;
pub mod recipes;
pub mod responses;
pub mod tags;
pub mod users;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::config::Config;
use crate::db::repositories::{
    SqlxIngredientRepository, SqlxMarkRepository, SqlxRecipeRepository, SqlxSessionRepository,
    SqlxSubscriptionRepository, SqlxTagRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    ImageStore, IngredientService, MarkService, RecipeService, SubscriptionService, TagService,
    UserService,
};

pub use middleware::{ApiError, AppState};

/// Wire repositories and services for the given pool
pub fn create_state(pool: DynDatabasePool, config: &Config) -> AppState {
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let tag_repo = SqlxTagRepository::boxed(pool.clone());
    let ingredient_repo = SqlxIngredientRepository::boxed(pool.clone());
    let recipe_repo = SqlxRecipeRepository::boxed(pool.clone());
    let mark_repo = SqlxMarkRepository::boxed(pool.clone());
    let subscription_repo = SqlxSubscriptionRepository::boxed(pool.clone());

    let images = Arc::new(ImageStore::new(config.upload.clone()));

    let user_service = Arc::new(UserService::with_session_expiration(
        user_repo.clone(),
        session_repo,
        config.session.expiration_days,
    ));
    let tag_service = Arc::new(TagService::new(tag_repo.clone()));
    let ingredient_service = Arc::new(IngredientService::new(ingredient_repo.clone()));
    let recipe_service = Arc::new(RecipeService::new(
        recipe_repo.clone(),
        tag_repo,
        ingredient_repo,
        user_repo.clone(),
        subscription_repo.clone(),
        mark_repo.clone(),
        images.clone(),
    ));
    let mark_service = Arc::new(MarkService::new(mark_repo, recipe_repo.clone()));
    let subscription_service = Arc::new(SubscriptionService::new(
        subscription_repo,
        user_repo,
        recipe_repo,
    ));

    AppState {
        pool,
        user_service,
        tag_service,
        ingredient_service,
        recipe_service,
        mark_service,
        subscription_service,
        images,
        pagination: Arc::new(config.pagination.clone()),
    }
}

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a valid token)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/users", users::protected_router())
        .nest("/recipes", recipes::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes (token optional, used for per-viewer flags)
    let public_routes = Router::new()
        .nest("/auth", auth::public_router())
        .nest("/users", users::public_router())
        .nest("/recipes", recipes::public_router())
        .nest("/tags", tags::router())
        .nest("/ingredients", ingredients::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ));

    public_routes.merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(e) => tracing::warn!("Ignoring invalid CORS origin '{}': {}", cors_origin, e),
    }

    let media_prefix = format!("/{}", state.images.config().url_prefix.trim_matches('/'));
    let media_dir = ServeDir::new(&state.images.config().path);

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .nest_service(&media_prefix, media_dir)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
