//! Captcha challenge storage for Redis.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

/// State stored per issued captcha. The answer stays server-side only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaState {
    pub answer: String,
    pub ip_hash: String,
    pub created_at: i64,
}

impl CaptchaState {
    pub fn new(answer: &str, ip_hash: &str) -> Self {
        Self {
            answer: answer.to_string(),
            ip_hash: ip_hash.to_string(),
            created_at: Utc::now().timestamp(),
        }
    }
}

/// Store for captcha challenge state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptchaStore: Send + Sync {
    /// Store a challenge with TTL.
    async fn store(&self, captcha_id: &str, state: &CaptchaState, ttl_secs: u64) -> Result<()>;

    /// Get challenge state by id.
    async fn get(&self, captcha_id: &str) -> Result<Option<CaptchaState>>;

    /// Delete a challenge (single use).
    async fn delete(&self, captcha_id: &str) -> Result<()>;
}

/// Redis implementation of CaptchaStore.
#[derive(Clone)]
pub struct RedisCaptchaStore {
    client: redis::Client,
}

impl RedisCaptchaStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn key(captcha_id: &str) -> String {
        format!("captcha:{}", captcha_id)
    }
}

#[async_trait]
impl CaptchaStore for RedisCaptchaStore {
    async fn store(&self, captcha_id: &str, state: &CaptchaState, ttl_secs: u64) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::key(captcha_id);

        let _: () = conn.set_ex(&key, serde_json::to_string(state)?, ttl_secs).await?;
        Ok(())
    }

    async fn get(&self, captcha_id: &str) -> Result<Option<CaptchaState>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::key(captcha_id);

        let json: Option<String> = conn.get(&key).await?;

        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, captcha_id: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::key(captcha_id);

        let _: () = conn.del(&key).await?;
        Ok(())
    }
}
