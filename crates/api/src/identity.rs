//! One-way transforms for network and account identifiers.
//!
//! Raw IPs, device identifiers and session tokens never reach the database;
//! everything is stored as a SHA256 hex digest. IP and device hashes are
//! additionally peppered with a server secret so a database dump alone
//! cannot be joined against traffic logs.

use rand::Rng;
use sha2::{Digest, Sha256};

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Peppered hash of a client IP, used as the per-IP signup lock key and in
/// rate limit keys and audit rows.
pub fn ip_hash(pepper: &str, ip: &str) -> String {
    sha256_hex(&format!("ip:{pepper}:{ip}"))
}

/// Peppered hash of a client-minted device identifier.
pub fn device_hash(pepper: &str, device_id: &str) -> String {
    sha256_hex(&format!("device:{pepper}:{device_id}"))
}

/// Unpeppered hash of a session token. The token itself is 32 random bytes,
/// so no pepper is needed for lookup keys.
pub fn token_hash(token: &str) -> String {
    sha256_hex(token)
}

/// Generate a random 32-byte session token as hex.
pub fn generate_session_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Generate a random per-user recovery salt.
pub fn generate_recovery_salt() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Generate a recovery code in `xxxx-xxxx-xxxx` form (12 hex digits).
pub fn generate_recovery_code() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 6] = rng.random();
    let hex = hex::encode(bytes);
    format!("{}-{}-{}", &hex[0..4], &hex[4..8], &hex[8..12])
}

/// Strip everything that is not a hex digit and lowercase, so dashes and
/// case never matter when a user types a code back in.
pub fn normalize_recovery_code(code: &str) -> String {
    code.chars()
        .filter(char::is_ascii_hexdigit)
        .collect::<String>()
        .to_lowercase()
}

/// Hash a recovery code against a per-user salt. Scoping the hash space per
/// user keeps a guessed code from matching across accounts.
pub fn recovery_code_hash(code: &str, salt: &str) -> String {
    sha256_hex(&format!("{}:{}", normalize_recovery_code(code), salt))
}
