//! User repository for database operations
//!
//! Users are read together with their role names (aggregated from `user_roles`).
//! Password hashing happens before records reach this layer.

use sqlx::PgPool;

use crate::core::db::models::{CreateUser, User};
use crate::core::db::store::StoreError;

/// Unique constraint names from the initial migration
const USERNAME_UNIQUE_CONSTRAINT: &str = "users_username_key";
const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

const SELECT_USER: &str = r#"
    SELECT u.id, u.name, u.username, u.email, u.password_hash, u.refresh_token_hash,
           COALESCE(array_agg(r.name ORDER BY r.name) FILTER (WHERE r.name IS NOT NULL), '{}') AS roles,
           u.created_at, u.updated_at
    FROM users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
    LEFT JOIN roles r ON r.id = ur.role_id
"#;

/// Map a unique violation on `users` to the matching store error
fn map_unique_violation(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
    {
        match db_err.constraint() {
            Some(USERNAME_UNIQUE_CONSTRAINT) => return StoreError::UsernameAlreadyExists,
            Some(EMAIL_UNIQUE_CONSTRAINT) => return StoreError::EmailAlreadyExists,
            _ => {}
        }
    }
    StoreError::DatabaseError(err)
}

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user with its role grants in one transaction
    pub async fn create(&self, dto: &CreateUser) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO users (name, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&dto.name)
        .bind(&dto.username)
        .bind(&dto.email)
        .bind(&dto.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        for role_id in &dto.role_ids {
            sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
                .bind(id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.find_by_id(id).await?.ok_or(StoreError::NotFound)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("{SELECT_USER} WHERE u.id = $1 GROUP BY u.id");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find a user by username
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("{SELECT_USER} WHERE u.username = $1 GROUP BY u.id");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("{SELECT_USER} WHERE u.email = $1 GROUP BY u.id");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find a user whose username or email equals `login`, preferring the username match
    pub async fn find_by_username_or_email(&self, login: &str) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "{SELECT_USER} WHERE u.username = $1 OR u.email = $1 \
             GROUP BY u.id ORDER BY (u.username = $1) DESC LIMIT 1"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    pub async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    /// Overwrite the refresh token digest (login)
    pub async fn set_refresh_token(&self, id: i64, token_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    /// Compare-and-swap the refresh token digest (rotation)
    pub async fn swap_refresh_token(
        &self,
        id: i64,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $3, updated_at = NOW()
            WHERE id = $1 AND refresh_token_hash = $2
            "#,
        )
        .bind(id)
        .bind(expected_hash)
        .bind(new_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// List all users ordered by id
    pub async fn list(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("{SELECT_USER} GROUP BY u.id ORDER BY u.id");
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    /// Check database connectivity
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
