//! Credential store abstraction
//!
//! The auth layer talks to user persistence only through [`CredentialStore`], so the
//! token lifecycle can run against PostgreSQL in production and against the in-memory
//! store in tests or database-less development runs.

use async_trait::async_trait;

use crate::core::db::models::{CreateUser, Role, User};
use crate::core::db::repositories::{RoleRepository, UserRepository};

/// Credential store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("User not found")]
    NotFound,

    #[error("Username already exists")]
    UsernameAlreadyExists,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Persistence operations needed by the auth core
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Resolve a login identifier; a username match wins over an email match.
    async fn find_by_username_or_email(&self, login: &str) -> Result<Option<User>, StoreError>;

    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError>;

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;

    /// Insert a user and its role grants. Uniqueness violations surface as
    /// [`StoreError::UsernameAlreadyExists`] / [`StoreError::EmailAlreadyExists`].
    async fn create_user(&self, user: CreateUser) -> Result<User, StoreError>;

    /// Unconditionally replace the stored refresh token digest.
    async fn set_refresh_token(&self, user_id: i64, token_hash: &str) -> Result<(), StoreError>;

    /// Replace the stored refresh token digest only if it still equals `expected_hash`.
    /// Returns `false` when another writer got there first.
    async fn swap_refresh_token(
        &self,
        user_id: i64,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// PostgreSQL-backed credential store
#[derive(Clone)]
pub struct PgCredentialStore {
    users: UserRepository,
    roles: RoleRepository,
}

impl PgCredentialStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            roles: RoleRepository::new(pool),
        }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.users.find_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.users.find_by_username(username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.users.find_by_email(email).await
    }

    async fn find_by_username_or_email(&self, login: &str) -> Result<Option<User>, StoreError> {
        self.users.find_by_username_or_email(login).await
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError> {
        self.users.exists_by_username(username).await
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        self.users.exists_by_email(email).await
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        self.roles.find_by_name(name).await
    }

    async fn create_user(&self, user: CreateUser) -> Result<User, StoreError> {
        self.users.create(&user).await
    }

    async fn set_refresh_token(&self, user_id: i64, token_hash: &str) -> Result<(), StoreError> {
        self.users.set_refresh_token(user_id, token_hash).await
    }

    async fn swap_refresh_token(
        &self,
        user_id: i64,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError> {
        self.users
            .swap_refresh_token(user_id, expected_hash, new_hash)
            .await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.users.list().await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.users.ping().await
    }
}
