//! Recovery code repository for PostgreSQL.
//!
//! Codes are one-time: consuming a code and updating the password commit in
//! a single transaction, so a code cannot be replayed even by concurrent
//! reset requests racing on it - only one UPDATE wins the `used_at IS NULL`
//! predicate.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecoveryCodeRepo: Send + Sync {
    /// Store the hashed codes issued to a fresh account.
    async fn issue(&self, user_id: Uuid, code_hashes: &[String]) -> Result<()>;

    /// Atomically mark the matching unused code as used and set the new
    /// password hash. Returns false when no unused code matches.
    async fn consume_and_reset_password(
        &self,
        user_id: Uuid,
        code_hash: &str,
        new_password_hash: &str,
    ) -> Result<bool>;
}

/// PostgreSQL implementation of RecoveryCodeRepo.
#[derive(Clone)]
pub struct PgRecoveryCodeRepo {
    pool: Pool<Postgres>,
}

impl PgRecoveryCodeRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecoveryCodeRepo for PgRecoveryCodeRepo {
    async fn issue(&self, user_id: Uuid, code_hashes: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for code_hash in code_hashes {
            sqlx::query("INSERT INTO recovery_codes (user_id, code_hash) VALUES ($1, $2)")
                .bind(user_id)
                .bind(code_hash)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn consume_and_reset_password(
        &self,
        user_id: Uuid,
        code_hash: &str,
        new_password_hash: &str,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            "UPDATE recovery_codes SET used_at = now()
             WHERE user_id = $1 AND code_hash = $2 AND used_at IS NULL",
        )
        .bind(user_id)
        .bind(code_hash)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            // Dropping the transaction rolls back; nothing was changed.
            return Ok(false);
        }

        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(new_password_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
