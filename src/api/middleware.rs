//! API middleware
//!
//! Contains:
//! - Application state shared by all handlers
//! - `ApiError`, the JSON error body, and the mapping from service errors
//! - Authentication (session token validation) middleware and extractors

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::PaginationConfig;
use crate::models::User;
use crate::services::{
    ImageStore, IngredientService, IngredientServiceError, MarkService, MarkServiceError,
    RecipeService, RecipeServiceError, SubscriptionService, SubscriptionServiceError, TagService,
    TagServiceError, UserService, UserServiceError, Viewer,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: crate::db::DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub tag_service: Arc<TagService>,
    pub ingredient_service: Arc<IngredientService>,
    pub recipe_service: Arc<RecipeService>,
    pub mark_service: Arc<MarkService>,
    pub subscription_service: Arc<SubscriptionService>,
    pub images: Arc<ImageStore>,
    pub pagination: Arc<PaginationConfig>,
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// User if the request carried a valid session, otherwise anonymous
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<User>);

impl OptionalUser {
    pub fn viewer(&self) -> Viewer {
        Viewer::from(self.0.as_ref().map(|u| u.id))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Log the cause and return a generic 500
    pub fn internal_error(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::validation_error(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::validation_error(msg),
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::NotFound => ApiError::not_found("Tag not found"),
            TagServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            TagServiceError::Conflict(msg) => ApiError::conflict(msg),
            TagServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<IngredientServiceError> for ApiError {
    fn from(err: IngredientServiceError) -> Self {
        match err {
            IngredientServiceError::NotFound => ApiError::not_found("Ingredient not found"),
            IngredientServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            IngredientServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<RecipeServiceError> for ApiError {
    fn from(err: RecipeServiceError) -> Self {
        match err {
            RecipeServiceError::NotFound => ApiError::not_found("Recipe not found"),
            RecipeServiceError::Forbidden => ApiError::forbidden(err.to_string()),
            RecipeServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            RecipeServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<MarkServiceError> for ApiError {
    fn from(err: MarkServiceError) -> Self {
        match err {
            MarkServiceError::NotFound => ApiError::not_found("Recipe not found"),
            MarkServiceError::AlreadyMarked(_) | MarkServiceError::NotMarked(_) => {
                ApiError::validation_error(err.to_string())
            }
            MarkServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<SubscriptionServiceError> for ApiError {
    fn from(err: SubscriptionServiceError) -> Self {
        match err {
            SubscriptionServiceError::NotFound => ApiError::not_found("User not found"),
            SubscriptionServiceError::InternalError(e) => ApiError::internal_error(e),
            other => ApiError::validation_error(other.to_string()),
        }
    }
}

/// Extract session token from the `Authorization` header
/// (`Token <t>` or `Bearer <t>`) or the `session` cookie
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            let token = auth_str
                .strip_prefix("Token ")
                .or_else(|| auth_str.strip_prefix("Bearer "));
            if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session lookup failed: {}", e),
        }
    }
    next.run(request).await
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided"))
    }
}

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(
            parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    async fn guarded_app() -> (axum::Router, String) {
        use crate::config::Config;
        use crate::db::{create_test_pool, migrations::run_migrations};
        use crate::models::CreateUserInput;

        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let state = crate::api::create_state(pool, &Config::default());
        state
            .user_service
            .register(CreateUserInput::new("cook@example.com", "cook", "A", "B", "pw"))
            .await
            .unwrap();
        let session = state.user_service.login("cook@example.com", "pw").await.unwrap();

        let app = axum::Router::new()
            .route(
                "/whoami",
                axum::routing::get(|user: AuthenticatedUser| async move { user.0.username }),
            )
            .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
            .with_state(state);
        (app, session.id)
    }

    #[tokio::test]
    async fn test_require_auth_rejects_missing_and_unknown_tokens() {
        use tower::ServiceExt;

        let (app, _) = guarded_app().await;
        let missing = Request::builder().uri("/whoami").body(axum::body::Body::empty()).unwrap();
        let unknown = Request::builder()
            .uri("/whoami")
            .header(header::AUTHORIZATION, "Token nope")
            .body(axum::body::Body::empty())
            .unwrap();

        assert_eq!(app.clone().oneshot(missing).await.unwrap().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.oneshot(unknown).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_auth_passes_user_to_handler() {
        use tower::ServiceExt;

        let (app, token) = guarded_app().await;
        let request = Request::builder()
            .uri("/whoami")
            .header(header::COOKIE, format!("session={}", token))
            .body(axum::body::Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"cook");
    }

    #[test]
    fn test_extract_token_scheme() {
        let token = headers_with(header::AUTHORIZATION, "Token abc123");
        let bearer = headers_with(header::AUTHORIZATION, "Bearer xyz");

        assert_eq!(extract_session_token(&token), Some("abc123".to_string()));
        assert_eq!(extract_session_token(&bearer), Some("xyz".to_string()));
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let headers = headers_with(header::COOKIE, "theme=dark; session=cookie-token");

        assert_eq!(extract_session_token(&headers), Some("cookie-token".to_string()));
    }

    #[test]
    fn test_extract_token_rejects_other_schemes() {
        let basic = headers_with(header::AUTHORIZATION, "Basic dXNlcjpwYXNz");
        let empty = headers_with(header::AUTHORIZATION, "Token ");
        let none = HeaderMap::new();

        assert_eq!(extract_session_token(&basic), None);
        assert_eq!(extract_session_token(&empty), None);
        assert_eq!(extract_session_token(&none), None);
    }

    #[test]
    fn test_status_follows_code() {
        let cases = [
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::validation_error("x"), StatusCode::BAD_REQUEST),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (ApiError::new("SOMETHING_ELSE", "x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_service_errors_map_to_codes() {
        let forbidden: ApiError = RecipeServiceError::Forbidden.into();
        let duplicate: ApiError = SubscriptionServiceError::AlreadySubscribed.into();
        let internal: ApiError = MarkServiceError::InternalError(anyhow::anyhow!("disk on fire")).into();

        assert_eq!(forbidden.error.code, "FORBIDDEN");
        assert_eq!(duplicate.error.code, "VALIDATION_ERROR");
        assert_eq!(internal.error.code, "INTERNAL_ERROR");
        assert!(!internal.error.message.contains("disk"));
    }

    #[test]
    fn test_api_error_with_details() {
        let error = ApiError::with_details(
            "VALIDATION_ERROR",
            "Invalid input",
            serde_json::json!({"field": "cooking_time"}),
        );

        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"]["details"]["field"], "cooking_time");
    }
}
