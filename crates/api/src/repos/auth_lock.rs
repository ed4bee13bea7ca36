//! Login failure lockout for PostgreSQL.
//!
//! One counter row per credential key. Every failed attempt counts the same;
//! at `MAX_FAILS` cumulative failures the key locks for `LOCK_MINUTES`. A
//! successful login clears the row entirely.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

pub const MAX_FAILS: i64 = 10;
pub const LOCK_MINUTES: i64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockStatus {
    pub locked: bool,
    /// 0 when unlocked
    pub retry_after_secs: i64,
}

impl LockStatus {
    fn unlocked() -> Self {
        Self {
            locked: false,
            retry_after_secs: 0,
        }
    }

    fn from_lock_until(lock_until: Option<DateTime<Utc>>) -> Self {
        match lock_until {
            Some(until) if until > Utc::now() => Self {
                locked: true,
                retry_after_secs: (until - Utc::now()).num_seconds().max(1),
            },
            _ => Self::unlocked(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthLockRepo: Send + Sync {
    /// Read-only: is the key currently locked?
    async fn check(&self, key: &str) -> Result<LockStatus>;

    /// Count a failed attempt; sets the lock when the threshold is reached.
    async fn record_failure(&self, key: &str) -> Result<LockStatus>;

    /// Reset counter and lock after a successful login.
    async fn clear(&self, key: &str) -> Result<()>;
}

/// PostgreSQL implementation of AuthLockRepo.
#[derive(Clone)]
pub struct PgAuthLockRepo {
    pool: Pool<Postgres>,
}

impl PgAuthLockRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthLockRepo for PgAuthLockRepo {
    async fn check(&self, key: &str) -> Result<LockStatus> {
        let row: Option<(Option<DateTime<Utc>>,)> =
            sqlx::query_as("SELECT lock_until FROM auth_locks WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match row {
            Some((lock_until,)) => LockStatus::from_lock_until(lock_until),
            None => LockStatus::unlocked(),
        })
    }

    async fn record_failure(&self, key: &str) -> Result<LockStatus> {
        let (_, lock_until): (i64, Option<DateTime<Utc>>) = sqlx::query_as(
            r#"
            INSERT INTO auth_locks AS a (key, fail_count)
            VALUES ($1, 1)
            ON CONFLICT (key) DO UPDATE SET
                fail_count = a.fail_count + 1,
                lock_until = CASE WHEN a.fail_count + 1 >= $2
                                  THEN now() + make_interval(mins => $3::double precision)
                                  ELSE a.lock_until END
            RETURNING fail_count, lock_until
            "#,
        )
        .bind(key)
        .bind(MAX_FAILS)
        .bind(LOCK_MINUTES)
        .fetch_one(&self.pool)
        .await?;

        Ok(LockStatus::from_lock_until(lock_until))
    }

    async fn clear(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM auth_locks WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn future_lock_reports_remaining_time() {
        let status = LockStatus::from_lock_until(Some(Utc::now() + Duration::minutes(10)));

        assert!(status.locked);
        assert!(status.retry_after_secs > 0);
        assert!(status.retry_after_secs <= 600);
    }

    #[test]
    fn expired_lock_is_unlocked() {
        let status = LockStatus::from_lock_until(Some(Utc::now() - Duration::seconds(1)));

        assert_eq!(status, LockStatus::unlocked());
    }

    #[test]
    fn absent_lock_is_unlocked() {
        assert_eq!(LockStatus::from_lock_until(None), LockStatus::unlocked());
    }
}
