//! Authentication error types
//!
//! Every failure in the auth core is an [`AuthError`]. [`AuthError::kind`] groups
//! the variants into the coarse categories callers branch on.

use crate::core::auth::jwt::JwtError;
use crate::core::db::store::StoreError;

/// Coarse error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthenticationFailed,
    InvalidToken,
    NotFound,
    Conflict,
    Configuration,
    Unauthorized,
    Forbidden,
    Validation,
    Internal,
}

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username/email or password")]
    InvalidCredentials,

    #[error("This token is invalid")]
    InvalidToken,

    #[error("Authentication required")]
    MissingBearerToken,

    #[error("Access denied")]
    Forbidden,

    #[error("User with id {0} does not exist")]
    UserNotFound(i64),

    #[error("User with such username already exists")]
    UsernameAlreadyExists,

    #[error("User with such email already exists")]
    EmailAlreadyExists,

    #[error("Role {0} does not exist in database")]
    MissingRole(String),

    #[error("Password too short (minimum 8 characters)")]
    PasswordTooShort,

    #[error("Password too long (maximum 72 bytes)")]
    PasswordTooLong,

    #[error("Password must contain an uppercase letter, a lowercase letter and a digit")]
    PasswordTooWeak,

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid username format")]
    InvalidUsername,

    #[error("Name must be between 1 and 100 characters")]
    InvalidName,

    /// The request could not be read (malformed body, missing field, bad path segment)
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials => ErrorKind::AuthenticationFailed,
            AuthError::InvalidToken => ErrorKind::InvalidToken,
            AuthError::MissingBearerToken => ErrorKind::Unauthorized,
            AuthError::Forbidden => ErrorKind::Forbidden,
            AuthError::UserNotFound(_) => ErrorKind::NotFound,
            AuthError::UsernameAlreadyExists | AuthError::EmailAlreadyExists => {
                ErrorKind::Conflict
            }
            AuthError::MissingRole(_) => ErrorKind::Configuration,
            AuthError::PasswordTooShort
            | AuthError::PasswordTooLong
            | AuthError::PasswordTooWeak
            | AuthError::InvalidEmail
            | AuthError::InvalidUsername
            | AuthError::InvalidName
            | AuthError::InvalidRequest(_) => ErrorKind::Validation,
            AuthError::InternalError(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UsernameAlreadyExists => AuthError::UsernameAlreadyExists,
            StoreError::EmailAlreadyExists => AuthError::EmailAlreadyExists,
            _ => AuthError::InternalError(err.to_string()),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired | JwtError::InvalidToken | JwtError::DecodingError(_) => {
                AuthError::InvalidToken
            }
            _ => AuthError::InternalError(err.to_string()),
        }
    }
}

impl From<bcrypt::BcryptError> for AuthError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AuthError::InternalError(format!("password hashing failed: {err}"))
    }
}
