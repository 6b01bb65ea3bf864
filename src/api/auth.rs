//! Authentication API endpoints
//!
//! - POST /api/auth/token/login - Exchange email and password for a token
//! - POST /api/auth/token/logout - Invalidate the current token

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::TokenResponse;

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new().route("/token/login", post(login))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/token/logout", post(logout))
}

/// POST /api/auth/token/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let session = state.user_service.login(&body.email, &body.password).await?;

    Ok(Json(TokenResponse {
        auth_token: session.id,
    }))
}

/// POST /api/auth/token/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}
