//! Authentication service
//!
//! Provides business logic for user registration, login and token refresh, plus the
//! role check guarding the user directory. Coordinates between the credential store,
//! the password hasher and the token manager.

use std::sync::Arc;

use serde::Deserialize;

use crate::core::auth::error::AuthError;
use crate::core::auth::password::PasswordHasher;
use crate::core::auth::tokens::{TokenManager, TokenPair};
use crate::core::db::models::{CreateUser, ROLE_ADMIN, ROLE_USER, User, UserResponse};
use crate::core::db::store::CredentialStore;

/// Maximum password length accepted by bcrypt
const MAX_PASSWORD_BYTES: usize = 72;

/// Registration request data
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Login request data
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

/// Account created at startup from configuration
#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenManager>,
    hasher: PasswordHasher,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenManager>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            store,
            tokens,
            hasher,
        }
    }

    /// Validate email format
    fn validate_email(email: &str) -> Result<(), AuthError> {
        let Some((local, domain)) = email.split_once('@') else {
            return Err(AuthError::InvalidEmail);
        };

        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(AuthError::InvalidEmail);
        }

        // Domain needs at least one dot and no empty labels
        if !domain.contains('.') || domain.split('.').any(|p| p.is_empty()) {
            return Err(AuthError::InvalidEmail);
        }

        Ok(())
    }

    /// Validate username format
    fn validate_username(username: &str) -> Result<(), AuthError> {
        // Username must be 3-50 characters
        if username.len() < 3 || username.len() > 50 {
            return Err(AuthError::InvalidUsername);
        }

        // Username must start with a letter
        if !username
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
        {
            return Err(AuthError::InvalidUsername);
        }

        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AuthError::InvalidUsername);
        }

        Ok(())
    }

    fn validate_name(name: &str) -> Result<(), AuthError> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.chars().count() > 100 {
            return Err(AuthError::InvalidName);
        }
        Ok(())
    }

    /// Validate password strength
    fn validate_password(password: &str) -> Result<(), AuthError> {
        if password.len() < 8 {
            return Err(AuthError::PasswordTooShort);
        }

        // bcrypt ignores everything past 72 bytes
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::PasswordTooLong);
        }

        let has_uppercase = password.chars().any(|c| c.is_uppercase());
        let has_lowercase = password.chars().any(|c| c.is_lowercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());

        if !has_uppercase || !has_lowercase || !has_digit {
            return Err(AuthError::PasswordTooWeak);
        }

        Ok(())
    }

    /// Register a new user with the default role
    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse, AuthError> {
        Self::validate_name(&request.name)?;
        Self::validate_username(&request.username)?;
        Self::validate_email(&request.email)?;
        Self::validate_password(&request.password)?;

        let user = self
            .create_account(
                request.name.trim(),
                &request.username,
                &request.email,
                &request.password,
                &[ROLE_USER],
            )
            .await?;

        tracing::info!("User {} registered with id {}", user.username, user.id);
        Ok(user.into())
    }

    /// Create the configured admin account unless the username is already taken.
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, admin: &AdminAccount) -> Result<bool, AuthError> {
        if self.store.exists_by_username(&admin.username).await? {
            tracing::debug!("Admin account {} already present", admin.username);
            return Ok(false);
        }

        Self::validate_username(&admin.username)?;
        Self::validate_email(&admin.email)?;
        Self::validate_password(&admin.password)?;

        let user = self
            .create_account(
                "Administrator",
                &admin.username,
                &admin.email,
                &admin.password,
                &[ROLE_USER, ROLE_ADMIN],
            )
            .await?;

        tracing::info!("Created admin account {} with id {}", user.username, user.id);
        Ok(true)
    }

    async fn create_account(
        &self,
        name: &str,
        username: &str,
        email: &str,
        password: &str,
        role_names: &[&str],
    ) -> Result<User, AuthError> {
        if self.store.exists_by_username(username).await? {
            return Err(AuthError::UsernameAlreadyExists);
        }
        if self.store.exists_by_email(email).await? {
            return Err(AuthError::EmailAlreadyExists);
        }

        let mut role_ids = Vec::with_capacity(role_names.len());
        for role_name in role_names {
            let role = self
                .store
                .find_role_by_name(role_name)
                .await?
                .ok_or_else(|| AuthError::MissingRole(role_name.to_string()))?;
            role_ids.push(role.id);
        }

        let password_hash = self.hasher.hash(password).await?;

        let user = self
            .store
            .create_user(CreateUser {
                name: name.to_string(),
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                role_ids,
            })
            .await?;

        Ok(user)
    }

    /// Login an existing user by username or email
    pub async fn login(&self, request: LoginRequest) -> Result<TokenPair, AuthError> {
        let user = self
            .store
            .find_by_username_or_email(&request.username_or_email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self
            .hasher
            .verify(&request.password, &user.password_hash)
            .await?
        {
            tracing::warn!("Failed login for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.tokens.issue(&user.username).await?;

        tracing::info!("User {} logged in", user.id);
        Ok(tokens)
    }

    /// Exchange a live token pair for a new one
    pub async fn refresh(
        &self,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<TokenPair, AuthError> {
        self.tokens.rotate(refresh_token, access_token).await
    }

    /// Resolve the caller behind `access_token` and require one of `required_roles`.
    pub async fn authorize(
        &self,
        access_token: &str,
        required_roles: &[&str],
    ) -> Result<User, AuthError> {
        let claims = self.tokens.jwt().validate_token(access_token)?;

        let user = self
            .store
            .find_by_username(&claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !user.has_any_role(required_roles) {
            tracing::warn!(
                "User {} denied: requires one of {:?}, has {:?}",
                user.id,
                required_roles,
                user.roles
            );
            return Err(AuthError::Forbidden);
        }

        Ok(user)
    }

    /// List every user
    pub async fn list_users(&self) -> Result<Vec<UserResponse>, AuthError> {
        let users = self.store.list_users().await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    /// Get one user by id
    pub async fn get_user(&self, id: i64) -> Result<UserResponse, AuthError> {
        self.store
            .find_by_id(id)
            .await?
            .map(UserResponse::from)
            .ok_or(AuthError::UserNotFound(id))
    }

    /// Check that the credential store is reachable
    pub async fn health_check(&self) -> Result<(), AuthError> {
        self.store.health_check().await?;
        Ok(())
    }
}
