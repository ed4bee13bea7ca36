//! Signup challenge issuance: proof-of-work tokens and captchas.
//!
//! Endpoints:
//! - GET /challenge/pow - Stateless signed PoW challenge (no storage)
//! - POST /challenge/captcha - SVG captcha, id delivered via HTTP-only cookie
//!
//! The captcha id rides an HTTP-only cookie so signup verification never has
//! to trust a client-supplied id alone. Issuance itself is rate-limited per
//! IP to stop challenge-generation abuse.

use axum::{
    Json, Router, debug_handler,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use shared::api::{CaptchaResponse, PowChallengeResponse};
use uuid::Uuid;

use crate::{
    captcha,
    error::AppError,
    identity,
    middleware::guards::ClientIp,
    pow,
    repos::kst_hour_window,
    state::AppState,
    stores::CaptchaState,
};

/// Name of the HTTP-only cookie carrying the captcha id.
pub const CAPTCHA_COOKIE: &str = "captcha_id";

/// Captcha issuance cap per IP per KST hour.
const CAPTCHA_LIMIT_PER_HOUR: i64 = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pow", get(pow_challenge))
        .route("/captcha", post(create_captcha))
}

#[debug_handler]
async fn pow_challenge(State(state): State<AppState>) -> impl IntoResponse {
    if !state.config.pow_enabled {
        return Json(PowChallengeResponse {
            enabled: false,
            token: None,
            nonce: None,
            expires_at: None,
            difficulty: None,
        });
    }

    let challenge = pow::create_challenge(
        state.config.pow_secret.as_bytes(),
        state.config.pow_difficulty,
        state.config.pow_ttl_secs,
        Utc::now(),
    );

    Json(PowChallengeResponse {
        enabled: true,
        token: Some(challenge.token),
        nonce: Some(challenge.nonce),
        expires_at: Some(challenge.expires_at),
        difficulty: Some(challenge.difficulty),
    })
}

#[debug_handler]
async fn create_captcha(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let ip_hash = identity::ip_hash(&state.config.hash_pepper, &ip);

    let (window_start, window_secs) = kst_hour_window(Utc::now());
    let decision = state
        .repos
        .rate_limit
        .check_and_incr(
            &format!("captcha:{ip_hash}"),
            CAPTCHA_LIMIT_PER_HOUR,
            window_start,
            window_secs,
        )
        .await?;

    if !decision.allowed {
        return Err(AppError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    let generated = captcha::generate();
    let captcha_id = Uuid::new_v4().to_string();
    let ttl_secs = state.config.captcha_ttl_secs;

    state
        .stores
        .captcha
        .store(
            &captcha_id,
            &CaptchaState::new(&generated.answer, &ip_hash),
            ttl_secs as u64,
        )
        .await?;

    let cookie = Cookie::build((CAPTCHA_COOKIE, captcha_id.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(ttl_secs))
        .build();

    tracing::info!(captcha_id = %captcha_id, "captcha issued");

    // Challenges must never come out of a cache
    Ok((
        jar.add(cookie),
        [
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(CaptchaResponse {
            captcha_id,
            svg: generated.svg,
        }),
    ))
}
