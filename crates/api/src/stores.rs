//! Ephemeral stores (Redis).
//!
//! Challenge state that exists only to be consumed once and expire lives in
//! Redis with TTL-based expiration; everything durable is in PostgreSQL.
//!
//! ## Redis Key Patterns
//!
//! ```text
//! captcha:{uuid} → CaptchaState JSON (auto-expires)
//! ```
//!
//! ## Usage in Handlers
//!
//! Stores are accessed via `state.stores`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     state.stores.captcha.store(&id, &state, ttl_secs).await?;
//! }
//! ```

mod captcha;

pub use captcha::{CaptchaState, CaptchaStore, RedisCaptchaStore};

#[cfg(test)]
pub use captcha::MockCaptchaStore;

use std::sync::Arc;

/// Collection of all ephemeral stores.
#[derive(Clone)]
pub struct Stores {
    pub captcha: Arc<dyn CaptchaStore>,
}
