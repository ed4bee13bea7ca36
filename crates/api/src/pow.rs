//! Stateless proof-of-work gate for signup.
//!
//! The challenge token is self-contained: `base64(nonce:expires_at:difficulty:sig)`
//! where `sig = HMAC-SHA256(secret, "nonce:expires_at:difficulty")`. Nothing is
//! stored server-side; verification recomputes the signature, checks expiry,
//! then checks that `SHA256(nonce:solution)` carries enough leading zero bits.
//!
//! This is a client-CPU cost gate, not a security boundary on its own - it is
//! layered with the captcha and the signup locks.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct Challenge {
    pub token: String,
    pub nonce: String,
    pub expires_at: i64,
    pub difficulty: u8,
}

/// Why a token/solution pair was rejected. `as_code` feeds the gate error
/// surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowError {
    /// Token is not base64/utf8
    InvalidToken,
    /// Token decoded but its fields don't parse
    InvalidPayload,
    InvalidSignature,
    Expired,
    InvalidSolution,
}

impl PowError {
    pub fn as_code(self) -> &'static str {
        match self {
            PowError::InvalidToken => "INVALID_TOKEN",
            PowError::InvalidPayload => "INVALID_PAYLOAD",
            PowError::InvalidSignature => "INVALID_SIGNATURE",
            PowError::Expired => "EXPIRED",
            PowError::InvalidSolution => "INVALID_SOLUTION",
        }
    }
}

fn sign(secret: &[u8], payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Mint a new challenge valid for `ttl_secs` from `now`.
pub fn create_challenge(secret: &[u8], difficulty: u8, ttl_secs: i64, now: DateTime<Utc>) -> Challenge {
    let nonce = {
        let mut rng = rand::rng();
        let bytes: [u8; 16] = rng.random();
        hex::encode(bytes)
    };
    let expires_at = now.timestamp() + ttl_secs;

    let payload = format!("{nonce}:{expires_at}:{difficulty}");
    let sig = sign(secret, &payload);
    let token = BASE64.encode(format!("{payload}:{sig}"));

    Challenge {
        token,
        nonce,
        expires_at,
        difficulty,
    }
}

/// Verify a solution against a self-encoded token.
pub fn verify(secret: &[u8], token: &str, solution: &str, now: DateTime<Utc>) -> Result<(), PowError> {
    let decoded = BASE64.decode(token).map_err(|_| PowError::InvalidToken)?;
    let decoded = String::from_utf8(decoded).map_err(|_| PowError::InvalidToken)?;

    let mut parts = decoded.splitn(4, ':');
    let (nonce, expires_at, difficulty, sig) = match (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) {
        (Some(n), Some(e), Some(d), Some(s)) => (n, e, d, s),
        _ => return Err(PowError::InvalidPayload),
    };

    let expires_at: i64 = expires_at.parse().map_err(|_| PowError::InvalidPayload)?;
    let difficulty: u8 = difficulty.parse().map_err(|_| PowError::InvalidPayload)?;

    let sig_bytes = hex::decode(sig).map_err(|_| PowError::InvalidPayload)?;
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(format!("{nonce}:{expires_at}:{difficulty}").as_bytes());
    mac.verify_slice(&sig_bytes)
        .map_err(|_| PowError::InvalidSignature)?;

    if now.timestamp() >= expires_at {
        return Err(PowError::Expired);
    }

    let mut hasher = Sha256::new();
    hasher.update(format!("{nonce}:{solution}").as_bytes());
    let hash = hasher.finalize();

    if !has_leading_zero_bits(&hash, difficulty) {
        return Err(PowError::InvalidSolution);
    }

    Ok(())
}

/// Check the first `difficulty` bits of `hash` are zero, byte by byte, with
/// a shift mask for the trailing partial byte.
fn has_leading_zero_bits(hash: &[u8], difficulty: u8) -> bool {
    let full_bytes = (difficulty / 8) as usize;
    let rem_bits = difficulty % 8;

    if full_bytes + usize::from(rem_bits > 0) > hash.len() {
        return false;
    }

    if hash[..full_bytes].iter().any(|b| *b != 0) {
        return false;
    }

    rem_bits == 0 || hash[full_bytes] >> (8 - rem_bits) == 0
}
