//! User directory endpoints
//!
//! Every request carries a bearer access token; the caller's roles are checked before
//! any user data is read.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::PathRejection},
    http::HeaderMap,
    routing::get,
};
use std::sync::Arc;

use crate::core::auth::AuthError;
use crate::core::auth::AuthService;
use crate::core::auth::api::extract_bearer_token;
use crate::core::db::models::{ROLE_ADMIN, ROLE_USER, UserResponse};

/// Users API state
#[derive(Clone)]
pub struct UsersApiState {
    pub auth_service: AuthService,
}

/// Create the users API router
pub fn users_api_router(state: UsersApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/v1/users", get(list_users_handler))
        .route("/api/v1/users/{id}", get(get_user_handler))
        .with_state(state)
}

/// GET /api/v1/users
async fn list_users_handler(
    State(state): State<Arc<UsersApiState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserResponse>>, AuthError> {
    let token = extract_bearer_token(&headers)?;
    let caller = state.auth_service.authorize(token, &[ROLE_ADMIN]).await?;

    tracing::debug!("User {} listing users", caller.id);

    let users = state.auth_service.list_users().await?;
    Ok(Json(users))
}

/// GET /api/v1/users/{id}
async fn get_user_handler(
    State(state): State<Arc<UsersApiState>>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<UserResponse>, AuthError> {
    let token = extract_bearer_token(&headers)?;
    state
        .auth_service
        .authorize(token, &[ROLE_USER, ROLE_ADMIN])
        .await?;

    let Path(id) = id?;

    let user = state.auth_service.get_user(id).await?;
    Ok(Json(user))
}
