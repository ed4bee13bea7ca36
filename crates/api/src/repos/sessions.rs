//! Bearer-token session repository for PostgreSQL.
//!
//! Only SHA256 hashes of tokens are stored; the plaintext token exists once,
//! in the signup/login response.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::Session;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Create a session for a user with the given token hash.
    async fn create(&self, user_id: Uuid, token_hash: &str, ttl_hours: i64) -> Result<Session>;

    /// Find a non-expired session by token hash.
    async fn find_valid(&self, token_hash: &str) -> Result<Option<Session>>;

    /// Delete a session (logout). Idempotent.
    async fn delete(&self, token_hash: &str) -> Result<()>;
}

/// PostgreSQL implementation of SessionRepo.
#[derive(Clone)]
pub struct PgSessionRepo {
    pool: Pool<Postgres>,
}

impl PgSessionRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepo for PgSessionRepo {
    async fn create(&self, user_id: Uuid, token_hash: &str, ttl_hours: i64) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token_hash, expires_at)
            VALUES ($1, $2, now() + make_interval(hours => $3::int))
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(ttl_hours)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn find_valid(&self, token_hash: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE token_hash = $1 AND expires_at > now()",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete(&self, token_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
