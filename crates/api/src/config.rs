use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    /// Sentry DSN for error tracking
    #[serde(default)]
    pub sentry_dsn: Option<String>,
    /// HMAC key for proof-of-work challenge tokens
    pub pow_secret: String,
    /// Pepper mixed into IP/device hashes so raw identifiers never hit the database
    pub hash_pepper: String,
    #[serde(default = "default_pow_enabled")]
    pub pow_enabled: bool,
    /// Leading zero bits required of SHA256(nonce:solution)
    #[serde(default = "default_pow_difficulty")]
    pub pow_difficulty: u8,
    #[serde(default = "default_pow_ttl_secs")]
    pub pow_ttl_secs: i64,
    #[serde(default = "default_captcha_ttl_secs")]
    pub captcha_ttl_secs: i64,
    #[serde(default = "default_max_accounts_per_ip")]
    pub signup_max_accounts_per_ip: i32,
    #[serde(default = "default_max_accounts_per_device")]
    pub signup_max_accounts_per_device: i32,
    /// How long a signup reservation holds an IP/device before it is released
    #[serde(default = "default_reservation_secs")]
    pub signup_reservation_secs: i64,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

fn default_pow_enabled() -> bool {
    true
}

fn default_pow_difficulty() -> u8 {
    12
}

fn default_pow_ttl_secs() -> i64 {
    180
}

fn default_captcha_ttl_secs() -> i64 {
    300
}

fn default_max_accounts_per_ip() -> i32 {
    3
}

fn default_max_accounts_per_device() -> i32 {
    2
}

fn default_reservation_secs() -> i64 {
    600
}

fn default_session_ttl_hours() -> i64 {
    24 * 30
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}
