//! Fixed-window rate limit counters for PostgreSQL.
//!
//! One row per key. The check-and-increment is a single upsert so two
//! concurrent requests can never both observe `count < limit` and slip past
//! the cap; a bucket whose window has passed is reset in place to count 1.
//!
//! Callers supply the window start rather than "now" - windows are aligned
//! to the top of the current KST hour or day so every caller in a window
//! shares one bucket.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, FixedOffset, Utc};
use sqlx::{Pool, Postgres};

/// Result of a rate limit check. `retry_after_secs` is 0 when allowed and
/// at least 1 when rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub count: i64,
    pub retry_after_secs: i64,
}

/// Gate for counting actions per key per fixed window.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimitRepo: Send + Sync {
    /// Count a hit against `key` and decide whether it is allowed.
    /// A rejection is final for the window; there are no internal retries.
    async fn check_and_incr(
        &self,
        key: &str,
        limit: i64,
        window_start: DateTime<Utc>,
        window_secs: i64,
    ) -> Result<RateLimitDecision>;
}

const KST_OFFSET_SECS: i32 = 9 * 3600;

fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).expect("valid fixed offset")
}

/// Start of the current hour in KST, as UTC. Window length is one hour.
pub fn kst_hour_window(now: DateTime<Utc>) -> (DateTime<Utc>, i64) {
    let start = now
        .with_timezone(&kst())
        .duration_trunc(Duration::hours(1))
        .expect("hour truncation cannot fail");
    (start.with_timezone(&Utc), 3600)
}

/// Start of the current day in KST, as UTC. Window length is 24 hours.
pub fn kst_day_window(now: DateTime<Utc>) -> (DateTime<Utc>, i64) {
    let start = now
        .with_timezone(&kst())
        .duration_trunc(Duration::days(1))
        .expect("day truncation cannot fail");
    (start.with_timezone(&Utc), 86_400)
}

/// PostgreSQL implementation of RateLimitRepo.
#[derive(Clone)]
pub struct PgRateLimitRepo {
    pool: Pool<Postgres>,
}

impl PgRateLimitRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitRepo for PgRateLimitRepo {
    async fn check_and_incr(
        &self,
        key: &str,
        limit: i64,
        window_start: DateTime<Utc>,
        window_secs: i64,
    ) -> Result<RateLimitDecision> {
        let reset_at = window_start + Duration::seconds(window_secs);

        // Single atomic statement: a live bucket increments, a stale one is
        // reset in place to a fresh window with count 1.
        let (count, reset_at): (i64, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO rate_limit_buckets AS b (key, count, reset_at, window_secs)
            VALUES ($1, 1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET
                count = CASE WHEN b.reset_at <= now() THEN 1 ELSE b.count + 1 END,
                reset_at = CASE WHEN b.reset_at <= now() THEN EXCLUDED.reset_at ELSE b.reset_at END,
                window_secs = EXCLUDED.window_secs
            RETURNING count, reset_at
            "#,
        )
        .bind(key)
        .bind(reset_at)
        .bind(window_secs)
        .fetch_one(&self.pool)
        .await?;

        Ok(decide(count, limit, reset_at, Utc::now()))
    }
}

/// Turn the post-upsert bucket state into an allow/reject decision.
fn decide(count: i64, limit: i64, reset_at: DateTime<Utc>, now: DateTime<Utc>) -> RateLimitDecision {
    if count <= limit {
        RateLimitDecision {
            allowed: true,
            count,
            retry_after_secs: 0,
        }
    } else {
        RateLimitDecision {
            allowed: false,
            count,
            retry_after_secs: (reset_at - now).num_seconds().max(1),
        }
    }
}
