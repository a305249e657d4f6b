//! Auth API endpoints
//!
//! Provides REST API endpoints for authentication:
//! - POST /api/auth/register (alias /api/auth/signup) - Register a new user
//! - POST /api/auth/login (alias /api/auth/signin) - Login and get a token pair
//! - POST /api/auth/refresh - Exchange the pair in the `Refresh-Token` and
//!   `Access-Token` headers for a new one

use axum::{
    Json, Router,
    extract::{
        State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::core::auth::{
    AuthError, AuthService, ErrorKind, LoginRequest, RegisterRequest, TokenPair,
};
use crate::core::db::models::UserResponse;

/// Header carrying the refresh token on `/api/auth/refresh`
pub const REFRESH_TOKEN_HEADER: &str = "refresh-token";
/// Header carrying the paired access token on `/api/auth/refresh`
pub const ACCESS_TOKEN_HEADER: &str = "access-token";

/// Auth API state containing the auth service
#[derive(Clone)]
pub struct AuthApiState {
    pub auth_service: AuthService,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub status: u16,
    pub error: String,
    pub code: String,
    pub timestamp: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            error: error.into(),
            code: code.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::AuthenticationFailed | ErrorKind::InvalidToken | ErrorKind::Unauthorized => {
            StatusCode::UNAUTHORIZED
        }
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert AuthError to API response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let code = match &self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::MissingBearerToken => "UNAUTHORIZED",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::UserNotFound(_) => "USER_NOT_FOUND",
            AuthError::UsernameAlreadyExists => "USERNAME_EXISTS",
            AuthError::EmailAlreadyExists => "EMAIL_EXISTS",
            AuthError::MissingRole(_) => "ROLE_NOT_CONFIGURED",
            AuthError::PasswordTooShort => "PASSWORD_TOO_SHORT",
            AuthError::PasswordTooLong => "PASSWORD_TOO_LONG",
            AuthError::PasswordTooWeak => "PASSWORD_TOO_WEAK",
            AuthError::InvalidEmail => "INVALID_EMAIL",
            AuthError::InvalidUsername => "INVALID_USERNAME",
            AuthError::InvalidName => "INVALID_NAME",
            AuthError::InvalidRequest(_) => "INVALID_REQUEST",
            AuthError::InternalError(_) => "INTERNAL_ERROR",
        };
        let status = status_for(self.kind());

        // Internal details stay in the logs
        let message = match &self {
            AuthError::InternalError(detail) => {
                tracing::error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            AuthError::MissingRole(role) => {
                tracing::error!("Role {} is not configured", role);
                self.to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ApiError::new(status, message, code))).into_response()
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AuthError {
    fn from(rejection: PathRejection) -> Self {
        AuthError::InvalidRequest(rejection.body_text())
    }
}

/// Response for a successful registration
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserResponse,
}

/// Create the auth API router
pub fn auth_api_router(state: AuthApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/signup", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/signin", post(login_handler))
        .route("/api/auth/refresh", post(refresh_handler))
        .with_state(state)
}

/// POST /api/auth/register
/// Register a new user
async fn register_handler(
    State(state): State<Arc<AuthApiState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let Json(request) = payload?;
    tracing::info!("Registration attempt for username: {}", request.username);

    let user = state.auth_service.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User has been created".to_string(),
            user,
        }),
    ))
}

/// POST /api/auth/login
/// Login and get access/refresh tokens
async fn login_handler(
    State(state): State<Arc<AuthApiState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, AuthError> {
    let Json(request) = payload?;
    tracing::info!("Login attempt for: {}", request.username_or_email);

    let tokens = state.auth_service.login(request).await?;

    Ok(Json(tokens))
}

/// POST /api/auth/refresh
/// Rotate the token pair carried in the request headers
async fn refresh_handler(
    State(state): State<Arc<AuthApiState>>,
    headers: HeaderMap,
) -> Result<Json<TokenPair>, AuthError> {
    tracing::debug!("Token refresh request");

    let refresh_token = header_value(&headers, REFRESH_TOKEN_HEADER)?;
    let access_token = header_value(&headers, ACCESS_TOKEN_HEADER)?;

    let tokens = state
        .auth_service
        .refresh(refresh_token, access_token)
        .await?;

    Ok(Json(tokens))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AuthError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::InvalidToken)
}

/// Extract Bearer token from Authorization header
pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingBearerToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingBearerToken)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingBearerToken);
    }

    Ok(token)
}
