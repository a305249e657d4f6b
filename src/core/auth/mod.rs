//! Authentication module for moto-auth
//!
//! This module provides authentication functionality including:
//! - JWT access token generation and validation
//! - Refresh tokens paired with access tokens, rotated on refresh
//! - User registration, login and role checks
//! - REST API endpoints for auth operations

pub mod api;
pub mod error;
pub mod jwt;
pub mod password;
pub mod service;
pub mod tokens;

pub use api::{AuthApiState, auth_api_router};
pub use error::{AuthError, ErrorKind};
pub use jwt::{AccessToken, Claims, JwtConfig, JwtError, JwtService};
pub use password::PasswordHasher;
pub use service::{AdminAccount, AuthService, LoginRequest, RegisterRequest};
pub use tokens::{TokenManager, TokenPair};
