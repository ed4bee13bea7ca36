//! User repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::User;

/// Repository for user operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Find a user by ID.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Find a user by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Create a new user. Returns None when the username is already taken.
    async fn create(
        &self,
        username: &str,
        nickname: &str,
        password_hash: &str,
        recovery_salt: &str,
        is_agent: bool,
    ) -> Result<Option<User>>;
}

/// PostgreSQL implementation of UserRepo.
#[derive(Clone)]
pub struct PgUserRepo {
    pool: Pool<Postgres>,
}

impl PgUserRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(
        &self,
        username: &str,
        nickname: &str,
        password_hash: &str,
        recovery_salt: &str,
        is_agent: bool,
    ) -> Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, nickname, password_hash, recovery_salt, is_agent)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(nickname)
        .bind(password_hash)
        .bind(recovery_salt)
        .bind(is_agent)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(Some(user)),
            // Unique violation on username is an expected outcome, not an error
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
