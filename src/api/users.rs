//! User API endpoints
//!
//! - POST /api/users - Register
//! - GET /api/users - List users (paginated)
//! - GET /api/users/me - Current user
//! - GET /api/users/{id} - User profile
//! - POST /api/users/set_password - Change password
//! - GET /api/users/subscriptions - Followed authors (paginated)
//! - POST/DELETE /api/users/{id}/subscribe - Follow / unfollow

use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{LimitOffsetQuery, Paginated};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser};
use crate::api::responses::{AuthorCardResponse, CreatedUserResponse, UserResponse};
use crate::models::{CreateUserInput, PagedResult};

/// Request body for registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub new_password: String,
    pub current_password: String,
}

/// Query for subscription endpoints
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Maximum recipes shown per author
    pub recipes_limit: Option<usize>,
}

/// Build public user routes (session optional)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(register))
        .route("/{id}", get(get_user))
}

/// Build protected user routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/set_password", post(set_password))
        .route("/subscriptions", get(subscriptions))
        .route("/{id}/subscribe", post(subscribe).delete(unsubscribe))
}

/// POST /api/users
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = CreateUserInput::new(
        body.email,
        body.username,
        body.first_name,
        body.last_name,
        body.password,
    );
    let user = state.user_service.register(input).await?;

    Ok((StatusCode::CREATED, Json(CreatedUserResponse::from(user))))
}

/// GET /api/users
async fn list_users(
    State(state): State<AppState>,
    viewer: OptionalUser,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<LimitOffsetQuery>,
) -> Result<Json<Paginated<UserResponse>>, ApiError> {
    let params = query.resolve(&state.pagination);
    let (users, total) = state.user_service.list(params.limit, params.offset).await?;

    let subscribed = match viewer.viewer().user_id() {
        Some(viewer_id) => {
            let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
            state.subscription_service.subscribed_among(viewer_id, &ids).await?
        }
        None => Default::default(),
    };

    let page = PagedResult::new(users, total).map(|user| {
        let is_subscribed = subscribed.contains(&user.id);
        UserResponse::new(user, is_subscribed)
    });
    Ok(Json(Paginated::from_page(page, params, &uri)))
}

/// GET /api/users/{id}
async fn get_user(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.user_service.get_by_id(id).await?;

    let is_subscribed = match viewer.viewer().user_id() {
        Some(viewer_id) => state
            .subscription_service
            .subscribed_among(viewer_id, &[id])
            .await?
            .contains(&id),
        None => false,
    };

    Ok(Json(UserResponse::new(user, is_subscribed)))
}

/// GET /api/users/me
async fn me(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(UserResponse::new(user.0, false))
}

/// POST /api/users/set_password
async fn set_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<SetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .user_service
        .set_password(&user.0, &body.current_password, &body.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/users/subscriptions
async fn subscriptions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<Json<Paginated<AuthorCardResponse>>, ApiError> {
    let params = LimitOffsetQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .resolve(&state.pagination);

    let page = state
        .subscription_service
        .list(user.0.id, params, query.recipes_limit)
        .await?
        .map(|card| AuthorCardResponse::new(card, &state.images));

    Ok(Json(Paginated::from_page(page, params, &uri)))
}

/// POST /api/users/{id}/subscribe
async fn subscribe(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let card = state
        .subscription_service
        .subscribe(user.0.id, id, query.recipes_limit)
        .await?;

    Ok((StatusCode::CREATED, Json(AuthorCardResponse::new(card, &state.images))))
}

/// DELETE /api/users/{id}/subscribe
async fn unsubscribe(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.subscription_service.unsubscribe(user.0.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
