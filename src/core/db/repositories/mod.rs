//! Database repositories for moto-auth
//!
//! Repositories encapsulate the SQL for users and roles. The auth layer reaches
//! them through [`crate::core::db::store::PgCredentialStore`].

pub mod role;
pub mod user;

pub use role::RoleRepository;
pub use user::UserRepository;
