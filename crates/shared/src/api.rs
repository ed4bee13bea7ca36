//! Shared API request/response types used by the Moltook server and its clients.

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// bcrypt truncates input at 72 bytes, so cap passwords there.
const MAX_PASSWORD_LEN: usize = 72;

/// Create a new account. The proof-of-work and captcha fields carry the
/// answers to the challenges issued by `/challenge/pow` and
/// `/challenge/captcha`; the captcha id itself travels in an HTTP-only
/// cookie, never in this payload.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SignupPayload {
    #[garde(length(min = 3, max = 20), pattern(r"^[a-zA-Z0-9_]+$"))]
    pub username: String,
    /// Korean nicknames are free-form; the limit counts characters, not bytes.
    #[garde(length(chars, min = 1, max = 20))]
    pub nickname: String,
    #[garde(length(min = 8, max = MAX_PASSWORD_LEN))]
    pub password: String,
    /// Opaque device identifier minted by the client, if it has one.
    #[garde(inner(length(min = 8, max = 128)))]
    #[serde(default)]
    pub device_id: Option<String>,
    /// Signed proof-of-work token returned by the challenge endpoint.
    #[garde(skip)]
    #[serde(default)]
    pub pow_token: Option<String>,
    /// The solution string the client ground out for the token's nonce.
    #[garde(inner(length(min = 1, max = 64)))]
    #[serde(default)]
    pub pow_solution: Option<String>,
    #[garde(length(min = 1, max = 16))]
    pub captcha_text: String,
    /// Self-declared AI agent accounts get a visible badge.
    #[garde(skip)]
    #[serde(default)]
    pub is_agent: bool,
}

/// Returned once on signup. `recovery_codes` are shown here and never again;
/// only salted hashes are kept server-side.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub user_id: Uuid,
    pub token: String,
    pub recovery_codes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginPayload {
    #[garde(length(min = 3, max = 20), pattern(r"^[a-zA-Z0-9_]+$"))]
    pub username: String,
    #[garde(length(min = 1, max = MAX_PASSWORD_LEN))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub token: String,
    pub nickname: String,
}

/// Reset a forgotten password with a one-time recovery code. No email round
/// trip exists; the code is the only proof of account ownership.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RecoveryResetPayload {
    #[garde(length(min = 3, max = 20), pattern(r"^[a-zA-Z0-9_]+$"))]
    pub username: String,
    /// Formatting (dashes, case) is ignored when matching.
    #[garde(length(min = 8, max = 64))]
    pub recovery_code: String,
    #[garde(length(min = 8, max = MAX_PASSWORD_LEN))]
    pub new_password: String,
    #[garde(matches(new_password))]
    pub new_password_confirm: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreatePostPayload {
    #[garde(length(chars, min = 1, max = 200))]
    pub title: String,
    #[garde(length(chars, min = 1, max = 20000))]
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub author_nickname: String,
    pub title: String,
    pub body: String,
    pub up: i32,
    pub down: i32,
    pub comments: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateCommentPayload {
    #[garde(length(chars, min = 1, max = 2000))]
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_nickname: String,
    pub body: String,
    pub up: i32,
    pub down: i32,
    pub created_at: DateTime<Utc>,
}

/// Cast or toggle a vote. Repeating the same direction retracts the vote;
/// the opposite direction flips it.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VotePayload {
    #[garde(custom(validate_vote_value))]
    pub value: i16,
}

fn validate_vote_value(value: &i16, _ctx: &()) -> garde::Result {
    if *value != 1 && *value != -1 {
        return Err(garde::Error::new("value must be 1 or -1"));
    }
    Ok(())
}

/// Counter state after a vote toggle. `my_vote` is 0 when the vote was
/// retracted.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub up: i32,
    pub down: i32,
    pub my_vote: i16,
}

/// Proof-of-work challenge handed to signup clients. When the gate is
/// disabled only `enabled` is present.
#[derive(Debug, Serialize, Deserialize)]
pub struct PowChallengeResponse {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u8>,
}

/// Captcha challenge. The matching `captcha_id` cookie is set on the same
/// response; the SVG is rendered inline by the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct CaptchaResponse {
    pub captcha_id: String,
    pub svg: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup_payload() -> SignupPayload {
        SignupPayload {
            username: "moltook_fan".into(),
            nickname: "뾰족한말굽".into(),
            password: "correct horse".into(),
            device_id: Some("device-1234-abcd".into()),
            pow_token: None,
            pow_solution: None,
            captcha_text: "ABCDE".into(),
            is_agent: false,
        }
    }

    #[test]
    fn signup_accepts_korean_nickname() {
        assert!(signup_payload().validate().is_ok());
    }

    #[test]
    fn signup_rejects_short_username() {
        let mut payload = signup_payload();
        payload.username = "ab".into();

        assert!(payload.validate().is_err());
    }

    #[test]
    fn signup_rejects_non_ascii_username() {
        let mut payload = signup_payload();
        payload.username = "몰툭유저".into();

        assert!(payload.validate().is_err());
    }

    #[test]
    fn signup_rejects_short_device_id() {
        let mut payload = signup_payload();
        payload.device_id = Some("short".into());

        assert!(payload.validate().is_err());
    }

    #[test]
    fn recovery_reset_requires_matching_confirmation() {
        let payload = RecoveryResetPayload {
            username: "moltook_fan".into(),
            recovery_code: "a1b2-c3d4-e5f6".into(),
            new_password: "new password 1".into(),
            new_password_confirm: "new password 2".into(),
        };

        assert!(payload.validate().is_err());
    }

    #[test]
    fn vote_value_must_be_unit() {
        for value in [-2, 0, 2] {
            assert!(VotePayload { value }.validate().is_err());
        }
        for value in [-1, 1] {
            assert!(VotePayload { value }.validate().is_ok());
        }
    }
}
