//! Shared test utilities for API handler tests.
//!
//! Provides common mock factories and a flexible `TestStateBuilder` for constructing
//! `AppState` instances with only the mocks needed for each test.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::test_utils::{TestStateBuilder, mock_user};
//!
//! let mut users = MockUserRepo::new();
//! users.expect_find_by_id().returning(|_| Ok(Some(mock_user("moltook_fan"))));
//!
//! let state = TestStateBuilder::new()
//!     .with_user_repo(users)
//!     .build();
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{PostDetail, Session, User};
use crate::repos::{
    MockAuthLockRepo, MockCommentRepo, MockCooldownRepo, MockPostRepo, MockRateLimitRepo,
    MockRecoveryCodeRepo, MockSecurityEventRepo, MockSessionRepo, MockSignupLockRepo,
    MockUserRepo, MockVoteRepo, Repos,
};
use crate::state::AppState;
use crate::stores::{MockCaptchaStore, Stores};

/// Pepper used by `test_config`; tests hashing IPs must use the same value.
pub const TEST_PEPPER: &str = "test-pepper";

/// Creates a test configuration with dummy values.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        database_url: "postgres://test".to_string(),
        redis_url: "redis://test".to_string(),
        env: "test".to_string(),
        sentry_dsn: None,
        pow_secret: "test-pow-secret".to_string(),
        hash_pepper: TEST_PEPPER.to_string(),
        pow_enabled: true,
        pow_difficulty: 8,
        pow_ttl_secs: 180,
        captcha_ttl_secs: 300,
        signup_max_accounts_per_ip: 3,
        signup_max_accounts_per_device: 2,
        signup_reservation_secs: 600,
        session_ttl_hours: 720,
    }
}

/// Creates a mock user with the given username.
pub fn mock_user(username: &str) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        nickname: "테스터".to_string(),
        password_hash: "$2b$04$placeholderplaceholderpl".to_string(),
        recovery_salt: Some("test-salt".to_string()),
        is_agent: false,
        banned_at: None,
        created_at: Utc::now(),
    }
}

/// Creates a mock session for the given user.
pub fn mock_session(user_id: Uuid) -> Session {
    Session {
        id: Uuid::new_v4(),
        user_id,
        token_hash: "token-hash".to_string(),
        created_at: Utc::now(),
        expires_at: Utc::now() + Duration::hours(720),
    }
}

/// Creates a mock post detail row.
pub fn mock_post_detail(
    title: &str,
    up: i32,
    down: i32,
    created_at: chrono::DateTime<Utc>,
) -> PostDetail {
    PostDetail {
        id: Uuid::new_v4(),
        author_id: Uuid::new_v4(),
        author_nickname: "테스터".to_string(),
        title: title.to_string(),
        body: "본문".to_string(),
        up_count: up,
        down_count: down,
        comment_count: 0,
        created_at,
    }
}

/// Builder for constructing test `AppState` with custom mocks.
///
/// Uses default (empty) mocks for any repo/store not explicitly set, except
/// the security event repo, which accepts any `log` call - handlers append
/// audit events on most paths and tests rarely care.
pub struct TestStateBuilder {
    pow_enabled: bool,
    user_repo: Option<MockUserRepo>,
    sessions: Option<MockSessionRepo>,
    post_repo: Option<MockPostRepo>,
    comment_repo: Option<MockCommentRepo>,
    vote_repo: Option<MockVoteRepo>,
    rate_limit: Option<MockRateLimitRepo>,
    cooldown: Option<MockCooldownRepo>,
    signup_locks: Option<MockSignupLockRepo>,
    auth_lock: Option<MockAuthLockRepo>,
    recovery: Option<MockRecoveryCodeRepo>,
    security_events: Option<MockSecurityEventRepo>,
    captcha_store: Option<MockCaptchaStore>,
}

impl TestStateBuilder {
    /// Creates a new builder with no mocks configured.
    pub fn new() -> Self {
        Self {
            pow_enabled: true,
            user_repo: None,
            sessions: None,
            post_repo: None,
            comment_repo: None,
            vote_repo: None,
            rate_limit: None,
            cooldown: None,
            signup_locks: None,
            auth_lock: None,
            recovery: None,
            security_events: None,
            captcha_store: None,
        }
    }

    /// Toggle the proof-of-work gate; most signup tests disable it so they
    /// need not grind hashes.
    pub fn with_pow_enabled(mut self, enabled: bool) -> Self {
        self.pow_enabled = enabled;
        self
    }

    pub fn with_user_repo(mut self, repo: MockUserRepo) -> Self {
        self.user_repo = Some(repo);
        self
    }

    pub fn with_sessions(mut self, repo: MockSessionRepo) -> Self {
        self.sessions = Some(repo);
        self
    }

    pub fn with_post_repo(mut self, repo: MockPostRepo) -> Self {
        self.post_repo = Some(repo);
        self
    }

    pub fn with_comment_repo(mut self, repo: MockCommentRepo) -> Self {
        self.comment_repo = Some(repo);
        self
    }

    pub fn with_vote_repo(mut self, repo: MockVoteRepo) -> Self {
        self.vote_repo = Some(repo);
        self
    }

    pub fn with_rate_limit(mut self, repo: MockRateLimitRepo) -> Self {
        self.rate_limit = Some(repo);
        self
    }

    pub fn with_cooldown(mut self, repo: MockCooldownRepo) -> Self {
        self.cooldown = Some(repo);
        self
    }

    pub fn with_signup_locks(mut self, repo: MockSignupLockRepo) -> Self {
        self.signup_locks = Some(repo);
        self
    }

    pub fn with_auth_lock(mut self, repo: MockAuthLockRepo) -> Self {
        self.auth_lock = Some(repo);
        self
    }

    pub fn with_recovery(mut self, repo: MockRecoveryCodeRepo) -> Self {
        self.recovery = Some(repo);
        self
    }

    #[allow(dead_code)]
    pub fn with_security_events(mut self, repo: MockSecurityEventRepo) -> Self {
        self.security_events = Some(repo);
        self
    }

    pub fn with_captcha_store(mut self, store: MockCaptchaStore) -> Self {
        self.captcha_store = Some(store);
        self
    }

    /// Builds the `AppState` using configured mocks or defaults.
    pub fn build(self) -> AppState {
        let repos = Repos {
            users: Arc::new(self.user_repo.unwrap_or_else(MockUserRepo::new)),
            sessions: Arc::new(self.sessions.unwrap_or_else(MockSessionRepo::new)),
            posts: Arc::new(self.post_repo.unwrap_or_else(MockPostRepo::new)),
            comments: Arc::new(self.comment_repo.unwrap_or_else(MockCommentRepo::new)),
            votes: Arc::new(self.vote_repo.unwrap_or_else(MockVoteRepo::new)),
            rate_limit: Arc::new(self.rate_limit.unwrap_or_else(MockRateLimitRepo::new)),
            cooldown: Arc::new(self.cooldown.unwrap_or_else(MockCooldownRepo::new)),
            signup_locks: Arc::new(self.signup_locks.unwrap_or_else(MockSignupLockRepo::new)),
            auth_lock: Arc::new(self.auth_lock.unwrap_or_else(MockAuthLockRepo::new)),
            recovery: Arc::new(self.recovery.unwrap_or_else(MockRecoveryCodeRepo::new)),
            security_events: Arc::new(
                self.security_events
                    .unwrap_or_else(default_security_events),
            ),
        };

        let stores = Stores {
            captcha: Arc::new(self.captcha_store.unwrap_or_else(MockCaptchaStore::new)),
        };

        let mut config = test_config();
        config.pow_enabled = self.pow_enabled;

        // Lazy handles never connect unless a test actually uses them
        let database = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("lazy pool");
        let redis = redis::Client::open(config.redis_url.as_str()).expect("redis client");

        AppState {
            config,
            database,
            redis,
            repos,
            stores,
        }
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Security event repo that accepts any log call.
fn default_security_events() -> MockSecurityEventRepo {
    let mut repo = MockSecurityEventRepo::new();
    repo.expect_log().returning(|_, _, _, _| ());
    repo
}
