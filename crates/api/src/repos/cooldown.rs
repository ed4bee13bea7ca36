//! Minimum-interval cooldown gate for PostgreSQL.
//!
//! Single timestamp per key, no counting. The stamp-if-eligible decision is
//! one conditional upsert; a success re-stamps `last_at`, so the cooldown
//! always extends from the most recent allowed action.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownDecision {
    pub ok: bool,
    /// 0 when allowed, at least 1 when rejected
    pub retry_after_secs: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CooldownRepo: Send + Sync {
    /// Allow the action iff at least `cooldown_secs` elapsed since the last
    /// allowed action on `key`. First call for a key always succeeds.
    async fn enforce(&self, key: &str, cooldown_secs: i64) -> Result<CooldownDecision>;
}

/// PostgreSQL implementation of CooldownRepo.
#[derive(Clone)]
pub struct PgCooldownRepo {
    pool: Pool<Postgres>,
}

impl PgCooldownRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CooldownRepo for PgCooldownRepo {
    async fn enforce(&self, key: &str, cooldown_secs: i64) -> Result<CooldownDecision> {
        // The upsert only fires when the interval has elapsed; no returned
        // row means the key is still cooling down.
        let stamped: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            INSERT INTO cooldowns AS c (key, last_at)
            VALUES ($1, now())
            ON CONFLICT (key) DO UPDATE SET last_at = now()
            WHERE c.last_at <= now() - make_interval(secs => $2::double precision)
            RETURNING c.last_at
            "#,
        )
        .bind(key)
        .bind(cooldown_secs)
        .fetch_optional(&self.pool)
        .await?;

        if stamped.is_some() {
            return Ok(CooldownDecision {
                ok: true,
                retry_after_secs: 0,
            });
        }

        // Read-only follow-up purely for the Retry-After hint; the rejection
        // itself was decided atomically above.
        let last_at: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT last_at FROM cooldowns WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        let retry_after_secs = match last_at {
            Some((last_at,)) => {
                let elapsed = (Utc::now() - last_at).num_seconds();
                (cooldown_secs - elapsed).max(1)
            }
            // Row vanished between the two statements; treat as one second.
            None => 1,
        };

        Ok(CooldownDecision {
            ok: false,
            retry_after_secs,
        })
    }
}
