//! In-memory credential store
//!
//! Backs the auth core when no `DATABASE_URL` is configured and in tests.
//! Username and email uniqueness are enforced through reservation maps so two
//! concurrent registrations cannot both claim the same name.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::core::db::models::{CreateUser, ROLE_ADMIN, ROLE_USER, Role, User};
use crate::core::db::store::{CredentialStore, StoreError};

/// Credential store held entirely in process memory
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: DashMap<i64, User>,
    usernames: DashMap<String, i64>,
    emails: DashMap<String, i64>,
    roles: DashMap<String, Role>,
    next_user_id: AtomicI64,
    next_role_id: AtomicI64,
}

impl InMemoryCredentialStore {
    /// Create an empty store with no roles
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `ROLE_USER` and `ROLE_ADMIN`
    pub fn with_default_roles() -> Self {
        let store = Self::new();
        store.add_role(ROLE_USER);
        store.add_role(ROLE_ADMIN);
        store
    }

    /// Insert a role if missing and return it
    pub fn add_role(&self, name: &str) -> Role {
        self.roles
            .entry(name.to_string())
            .or_insert_with(|| Role {
                id: self.next_role_id.fetch_add(1, Ordering::SeqCst) + 1,
                name: name.to_string(),
            })
            .clone()
    }

    fn role_names(&self, role_ids: &[i64]) -> Vec<String> {
        let mut names: Vec<String> = self
            .roles
            .iter()
            .filter(|r| role_ids.contains(&r.id))
            .map(|r| r.name.clone())
            .collect();
        names.sort();
        names
    }

    fn user_by_index(&self, index: &DashMap<String, i64>, key: &str) -> Option<User> {
        let id = *index.get(key)?;
        self.users.get(&id).map(|u| u.clone())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.user_by_index(&self.usernames, username))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.user_by_index(&self.emails, email))
    }

    async fn find_by_username_or_email(&self, login: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .user_by_index(&self.usernames, login)
            .or_else(|| self.user_by_index(&self.emails, login)))
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.usernames.contains_key(username))
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.emails.contains_key(email))
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        Ok(self.roles.get(name).map(|r| r.clone()))
    }

    async fn create_user(&self, dto: CreateUser) -> Result<User, StoreError> {
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst) + 1;

        match self.usernames.entry(dto.username.clone()) {
            Entry::Occupied(_) => return Err(StoreError::UsernameAlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        match self.emails.entry(dto.email.clone()) {
            Entry::Occupied(_) => {
                self.usernames.remove(&dto.username);
                return Err(StoreError::EmailAlreadyExists);
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = Utc::now();
        let user = User {
            id,
            name: dto.name,
            username: dto.username,
            email: dto.email,
            password_hash: dto.password_hash,
            refresh_token_hash: None,
            roles: self.role_names(&dto.role_ids),
            created_at: now,
            updated_at: now,
        };
        self.users.insert(id, user.clone());

        Ok(user)
    }

    async fn set_refresh_token(&self, user_id: i64, token_hash: &str) -> Result<(), StoreError> {
        let mut user = self.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.refresh_token_hash = Some(token_hash.to_string());
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        user_id: i64,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError> {
        // The shard write lock held by `get_mut` makes the compare and the write atomic.
        let Some(mut user) = self.users.get_mut(&user_id) else {
            return Ok(false);
        };
        if user.refresh_token_hash.as_deref() != Some(expected_hash) {
            return Ok(false);
        }
        user.refresh_token_hash = Some(new_hash.to_string());
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.clone()).collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
