//! Password hashing with bcrypt
//!
//! Hashing and verification run on the blocking thread pool; bcrypt at production
//! cost takes long enough to stall an async worker.

use crate::core::auth::error::AuthError;

/// Cost factor for bcrypt hashing (12 is recommended for production)
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// bcrypt password hasher with a fixed cost
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password with automatic salt generation
    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .map_err(AuthError::from)
    }

    /// Verify a password against a bcrypt hash
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .map_err(AuthError::from)
    }
}
