//! moto-auth - Authentication Backend
//!
//! Registration, login and refresh-token rotation over a REST API, with JWT access
//! tokens, bcrypt password hashes and PostgreSQL or in-memory user storage.

pub mod app;
pub mod core;
