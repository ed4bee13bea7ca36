//! Per-IP and per-device signup locks for PostgreSQL.
//!
//! Each (kind, key) row walks a three-state machine:
//! unreserved -> reserved (TTL) -> bound. A reservation holds the key while
//! one signup is in flight; its TTL releases abandoned attempts. Binding
//! clears the reservation and counts the signup; a bound key only accepts
//! new reservations while its effective signup count is under the cap.
//!
//! The allow/reject decision is a single conditional upsert so concurrent
//! signups from one network or device cannot race past the cap. Rejection
//! classification re-reads the row, which is reporting only.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Ip,
    Device,
}

impl LockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LockKind::Ip => "ip",
            LockKind::Device => "device",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    Allowed,
    /// Another signup from this key is in flight
    Reserved { retry_after_secs: i64 },
    /// The key has reached its account cap
    Limit,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignupLockRepo: Send + Sync {
    /// Try to reserve `key` for one signup attempt.
    async fn reserve(
        &self,
        kind: LockKind,
        key: &str,
        reservation_secs: i64,
        max_accounts: i32,
    ) -> Result<ReserveOutcome>;

    /// Bind a reserved key to a freshly created account.
    async fn bind(&self, kind: LockKind, key: &str, user_id: Uuid) -> Result<()>;
}

#[derive(Debug, sqlx::FromRow)]
struct LockRow {
    status: String,
    reserved_until: Option<DateTime<Utc>>,
    user_id: Option<Uuid>,
    signup_count: i32,
}

impl LockRow {
    /// Legacy rows predate count tracking: bound with a user but count 0
    /// still means one signup happened.
    fn effective_count(&self) -> i32 {
        if self.signup_count <= 0 && self.user_id.is_some() {
            1
        } else {
            self.signup_count.max(0)
        }
    }
}

/// PostgreSQL implementation of SignupLockRepo.
#[derive(Clone)]
pub struct PgSignupLockRepo {
    pool: Pool<Postgres>,
}

impl PgSignupLockRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignupLockRepo for PgSignupLockRepo {
    async fn reserve(
        &self,
        kind: LockKind,
        key: &str,
        reservation_secs: i64,
        max_accounts: i32,
    ) -> Result<ReserveOutcome> {
        // One statement decides: no row or a released/expired reservation
        // starts a new one; a bound key re-reserves only under the cap.
        let reserved: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO signup_locks AS l (kind, key, status, reserved_until, signup_count)
            VALUES ($1, $2, 'reserved', now() + make_interval(secs => $3::double precision), 0)
            ON CONFLICT (kind, key) DO UPDATE SET
                reserved_until = now() + make_interval(secs => $3::double precision)
            WHERE (l.reserved_until IS NULL OR l.reserved_until <= now())
              AND (l.status <> 'bound'
                   OR (CASE WHEN l.signup_count <= 0 AND l.user_id IS NOT NULL THEN 1
                            ELSE GREATEST(l.signup_count, 0) END) < $4)
            RETURNING l.key
            "#,
        )
        .bind(kind.as_str())
        .bind(key)
        .bind(reservation_secs)
        .bind(max_accounts)
        .fetch_optional(&self.pool)
        .await?;

        if reserved.is_some() {
            return Ok(ReserveOutcome::Allowed);
        }

        // Classify the rejection for the caller's error message.
        let row: Option<LockRow> = sqlx::query_as(
            "SELECT status, reserved_until, user_id, signup_count
             FROM signup_locks WHERE kind = $1 AND key = $2",
        )
        .bind(kind.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            // Row deleted between statements; the next attempt will succeed.
            return Ok(ReserveOutcome::Reserved {
                retry_after_secs: 1,
            });
        };

        if row.status == "bound" && row.effective_count() >= max_accounts {
            return Ok(ReserveOutcome::Limit);
        }

        let retry_after_secs = row
            .reserved_until
            .map(|until| (until - Utc::now()).num_seconds().max(1))
            .unwrap_or(1);

        Ok(ReserveOutcome::Reserved { retry_after_secs })
    }

    async fn bind(&self, kind: LockKind, key: &str, user_id: Uuid) -> Result<()> {
        // Binding releases the reservation and counts the signup. The CASE
        // carries the legacy zero-count shim through the increment.
        sqlx::query(
            r#"
            INSERT INTO signup_locks AS l (kind, key, status, bound_at, user_id, signup_count)
            VALUES ($1, $2, 'bound', now(), $3, 1)
            ON CONFLICT (kind, key) DO UPDATE SET
                status = 'bound',
                bound_at = now(),
                user_id = $3,
                reserved_until = NULL,
                signup_count = CASE WHEN l.signup_count <= 0 AND l.user_id IS NOT NULL THEN 2
                                    ELSE GREATEST(l.signup_count, 0) + 1 END
            "#,
        )
        .bind(kind.as_str())
        .bind(key)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
