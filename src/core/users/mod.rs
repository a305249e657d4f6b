//! Users module for moto-auth
//!
//! Read-only user directory guarded by role checks:
//! - GET /api/v1/users - list all users (admins only)
//! - GET /api/v1/users/{id} - get one user

pub mod api;

pub use api::{UsersApiState, users_api_router};
