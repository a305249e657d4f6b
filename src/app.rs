//! HTTP application assembly
//!
//! Merges the auth and user routers, adds the health check and wraps everything in
//! tracing and CORS middleware.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::auth::{AuthApiState, AuthService, auth_api_router};
use crate::core::users::{UsersApiState, users_api_router};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Build the full application router
pub fn build_router(auth_service: AuthService) -> Router {
    // CORS configuration for browser clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let health = Router::new()
        .route("/health", get(health_handler))
        .with_state(auth_service.clone());

    Router::new()
        .merge(health)
        .merge(auth_api_router(AuthApiState {
            auth_service: auth_service.clone(),
        }))
        .merge(users_api_router(UsersApiState { auth_service }))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// GET /health
async fn health_handler(State(auth_service): State<AuthService>) -> impl IntoResponse {
    match auth_service.health_check().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "ok" })),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::core::auth::{JwtConfig, JwtService, PasswordHasher, TokenManager};
    use crate::core::db::InMemoryCredentialStore;

    fn app() -> Router {
        let store = Arc::new(InMemoryCredentialStore::with_default_roles());
        let jwt = JwtService::new(JwtConfig::new("test_secret_key_for_testing_only_32bytes!"));
        let tokens = Arc::new(TokenManager::new(
            jwt,
            store.clone(),
            StdRng::seed_from_u64(3),
        ));
        build_router(AuthService::new(store, tokens, PasswordHasher::new(4)))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_routes_are_merged() {
        let app = app();

        let response = app
            .clone()
            .oneshot(Request::get("/api/v1/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::post("/api/auth/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unreadable_requests_get_json_errors() {
        let app = app();

        let login = Request::post("/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let user = Request::get("/api/v1/users/abc").body(Body::empty()).unwrap();

        for request in [login, user] {
            let response = app.clone().oneshot(request).await.unwrap();
            assert!(response.status().is_client_error());

            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert!(body["code"].is_string());
            assert!(body["timestamp"].is_string());
        }
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = app()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
