use std::sync::Arc;

use moto_auth::app::build_router;
use moto_auth::core::auth::{AuthService, JwtConfig, JwtService, PasswordHasher, TokenManager};
use moto_auth::core::config::Config;
use moto_auth::core::db::{
    CredentialStore, DbConfig, InMemoryCredentialStore, PgCredentialStore,
    create_pool_with_migrations,
};

#[tokio::main]
async fn main() {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load application config from environment variables
    let config = Config::from_env();

    // Log config status (without revealing secrets)
    tracing::info!(
        "Config loaded: database={}, admin={}, bind_addr={}",
        config.has_database(),
        config.has_admin(),
        config.bind_addr
    );

    let jwt_config = match JwtConfig::from_env_or_dev() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid JWT configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn CredentialStore> = match &config.database_url {
        Some(url) => {
            let db_config = match DbConfig::from_env() {
                Ok(db_config) => db_config,
                Err(_) => DbConfig::new(url.clone()),
            };
            match create_pool_with_migrations(&db_config).await {
                Ok(pool) => {
                    tracing::info!("Connected to PostgreSQL");
                    Arc::new(PgCredentialStore::new(pool))
                }
                Err(e) => {
                    tracing::error!("Failed to initialize database: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            tracing::warn!("DATABASE_URL not set, users are kept in memory and lost on restart");
            Arc::new(InMemoryCredentialStore::with_default_roles())
        }
    };

    let tokens = Arc::new(TokenManager::from_entropy(
        JwtService::new(jwt_config),
        store.clone(),
    ));
    let auth_service = AuthService::new(store, tokens, PasswordHasher::new(config.bcrypt_cost));

    if let Some(admin) = &config.admin
        && let Err(e) = auth_service.ensure_admin(admin).await
    {
        tracing::error!("Failed to create admin account {}: {}", admin.username, e);
    }

    let app = build_router(auth_service);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("listening on http://{}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
