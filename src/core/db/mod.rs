//! Database module for moto-auth
//!
//! Models, the PostgreSQL pool and repositories, and the [`CredentialStore`]
//! abstraction with its PostgreSQL and in-memory implementations.

pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;
pub mod store;

// Re-export commonly used items
pub use memory::InMemoryCredentialStore;
pub use models::*;
pub use pool::{DbConfig, DbError, create_pool, create_pool_with_migrations};
pub use repositories::{RoleRepository, UserRepository};
pub use store::{CredentialStore, PgCredentialStore, StoreError};

// Re-export sqlx types that might be needed
pub use sqlx::PgPool;
