//! Database repositories and gates (PostgreSQL).
//!
//! This module contains traits and implementations for durable state.
//! Each repository is abstracted behind a trait to enable mocking in tests.
//!
//! ## Repositories
//!
//! - **users** / **sessions** - Accounts and bearer-token sessions
//! - **posts** / **comments** / **votes** - Community content and the vote toggle
//! - **recovery** - One-time password recovery codes
//! - **security_events** - Best-effort append-only audit trail
//!
//! ## Gates
//!
//! - **rate_limit** - Fixed-window counters (atomic upsert per key)
//! - **cooldown** - Minimum-interval stamp per key
//! - **signup_locks** - Per-IP/per-device signup reservation state machine
//! - **auth_lock** - Escalating login failure lockout
//!
//! Every gate decision is a single conditional statement or transaction, so
//! concurrent requests on the same key cannot both slip past a limit.
//!
//! ## Usage in Handlers
//!
//! Repositories are accessed via `state.repos`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let user = state.repos.users.find_by_id(user_id).await?;
//!     let decision = state.repos.rate_limit.check_and_incr(&key, 10, start, 3600).await?;
//! }
//! ```

mod auth_lock;
mod comments;
mod cooldown;
mod posts;
mod rate_limit;
mod recovery;
mod security_events;
mod sessions;
mod signup_locks;
mod users;
mod votes;

pub use auth_lock::{AuthLockRepo, LOCK_MINUTES, LockStatus, MAX_FAILS, PgAuthLockRepo};
pub use comments::{CommentRepo, PgCommentRepo};
pub use cooldown::{CooldownDecision, CooldownRepo, PgCooldownRepo};
pub use posts::{PgPostRepo, PostRepo};
pub use rate_limit::{
    PgRateLimitRepo, RateLimitDecision, RateLimitRepo, kst_day_window, kst_hour_window,
};
pub use recovery::{PgRecoveryCodeRepo, RecoveryCodeRepo};
pub use security_events::{PgSecurityEventRepo, SecurityEventRepo, events};
pub use sessions::{PgSessionRepo, SessionRepo};
pub use signup_locks::{LockKind, PgSignupLockRepo, ReserveOutcome, SignupLockRepo};
pub use users::{PgUserRepo, UserRepo};
pub use votes::{PgVoteRepo, VoteCounts, VoteRepo, VoteTarget};

#[cfg(test)]
pub use auth_lock::MockAuthLockRepo;
#[cfg(test)]
pub use comments::MockCommentRepo;
#[cfg(test)]
pub use cooldown::MockCooldownRepo;
#[cfg(test)]
pub use posts::MockPostRepo;
#[cfg(test)]
pub use rate_limit::MockRateLimitRepo;
#[cfg(test)]
pub use recovery::MockRecoveryCodeRepo;
#[cfg(test)]
pub use security_events::MockSecurityEventRepo;
#[cfg(test)]
pub use sessions::MockSessionRepo;
#[cfg(test)]
pub use signup_locks::MockSignupLockRepo;
#[cfg(test)]
pub use users::MockUserRepo;
#[cfg(test)]
pub use votes::MockVoteRepo;

use std::sync::Arc;

/// Collection of all database repositories and gates.
#[derive(Clone)]
pub struct Repos {
    pub users: Arc<dyn UserRepo>,
    pub sessions: Arc<dyn SessionRepo>,
    pub posts: Arc<dyn PostRepo>,
    pub comments: Arc<dyn CommentRepo>,
    pub votes: Arc<dyn VoteRepo>,
    pub rate_limit: Arc<dyn RateLimitRepo>,
    pub cooldown: Arc<dyn CooldownRepo>,
    pub signup_locks: Arc<dyn SignupLockRepo>,
    pub auth_lock: Arc<dyn AuthLockRepo>,
    pub recovery: Arc<dyn RecoveryCodeRepo>,
    pub security_events: Arc<dyn SecurityEventRepo>,
}
