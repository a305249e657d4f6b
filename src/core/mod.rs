//! Core domain logic: authentication, persistence and configuration

pub mod auth;
pub mod config;
pub mod db;
pub mod users;
