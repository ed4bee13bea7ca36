//! Security event trail for PostgreSQL.
//!
//! Fire-and-forget: failures are recorded in the log stream but never
//! propagate, so an audit outage cannot block signups or logins.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

/// Event types for the security trail.
pub mod events {
    pub const SIGNUP: &str = "signup";
    pub const SIGNUP_BLOCKED: &str = "signup.blocked";
    pub const LOGIN_SUCCESS: &str = "login.success";
    pub const LOGIN_FAILED: &str = "login.failed";
    pub const LOGIN_LOCKED: &str = "login.locked";
    pub const RECOVERY_RESET: &str = "recovery.reset";
    pub const RECOVERY_FAILED: &str = "recovery.failed";
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecurityEventRepo: Send + Sync {
    /// Append an event (best-effort; errors are logged, never returned).
    async fn log(
        &self,
        event_type: &str,
        user_id: Option<Uuid>,
        ip_hash: Option<&str>,
        detail: serde_json::Value,
    );
}

/// PostgreSQL implementation of SecurityEventRepo.
#[derive(Clone)]
pub struct PgSecurityEventRepo {
    pool: Pool<Postgres>,
}

impl PgSecurityEventRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecurityEventRepo for PgSecurityEventRepo {
    async fn log(
        &self,
        event_type: &str,
        user_id: Option<Uuid>,
        ip_hash: Option<&str>,
        detail: serde_json::Value,
    ) {
        let result = sqlx::query(
            "INSERT INTO security_events (event_type, user_id, ip_hash, detail)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(event_type)
        .bind(user_id)
        .bind(ip_hash)
        .bind(detail)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::error!(
                event_type = %event_type,
                user_id = ?user_id,
                error = %e,
                "Failed to log security event"
            );
        }
    }
}
