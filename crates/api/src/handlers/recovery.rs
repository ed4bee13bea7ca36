//! Password reset via one-time recovery codes.
//!
//! There is no email round trip: the recovery code issued at signup is the
//! only proof of account ownership. Every failure mode answers identically
//! so the endpoint leaks nothing about which usernames exist or which codes
//! were ever valid. The code consumption and the password update commit in
//! one transaction, so a code can never be replayed.

use axum::{Json, Router, debug_handler, extract::State, response::IntoResponse, routing::post};
use chrono::Utc;
use garde::Validate;
use serde_json::json;
use shared::api::RecoveryResetPayload;

use crate::{
    error::AppError,
    identity,
    middleware::guards::{ClientIp, SameOrigin},
    repos::{events, kst_hour_window},
    state::AppState,
};

/// Reset attempts allowed per IP per KST hour.
const RESET_LIMIT_PER_HOUR: i64 = 5;

pub fn router() -> Router<AppState> {
    Router::new().route("/recovery", post(reset))
}

fn invalid() -> AppError {
    AppError::gate("RECOVERY_INVALID", "Invalid username or recovery code")
}

#[debug_handler]
async fn reset(
    State(state): State<AppState>,
    _origin: SameOrigin,
    ClientIp(ip): ClientIp,
    Json(payload): Json<RecoveryResetPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let ip_hash = identity::ip_hash(&state.config.hash_pepper, &ip);

    let (window_start, window_secs) = kst_hour_window(Utc::now());
    let decision = state
        .repos
        .rate_limit
        .check_and_incr(
            &format!("recovery:{ip_hash}"),
            RESET_LIMIT_PER_HOUR,
            window_start,
            window_secs,
        )
        .await?;

    if !decision.allowed {
        return Err(AppError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    let user = state.repos.users.find_by_username(&payload.username).await?;

    // User or salt missing both take the generic path - no enumeration
    let Some((user, salt)) = user.and_then(|u| {
        let salt = u.recovery_salt.clone()?;
        Some((u, salt))
    }) else {
        state
            .repos
            .security_events
            .log(events::RECOVERY_FAILED, None, Some(&ip_hash), json!({}))
            .await;
        return Err(invalid());
    };

    let code_hash = identity::recovery_code_hash(&payload.recovery_code, &salt);

    let new_password = payload.new_password.clone();
    let new_password_hash =
        tokio::task::spawn_blocking(move || bcrypt::hash(&new_password, bcrypt::DEFAULT_COST))
            .await
            .map_err(|e| anyhow::anyhow!("password hashing task failed: {e}"))??;

    let consumed = state
        .repos
        .recovery
        .consume_and_reset_password(user.id, &code_hash, &new_password_hash)
        .await?;

    if !consumed {
        state
            .repos
            .security_events
            .log(events::RECOVERY_FAILED, Some(user.id), Some(&ip_hash), json!({}))
            .await;
        return Err(invalid());
    }

    // A fresh password clears any standing lockout on the account
    state
        .repos
        .auth_lock
        .clear(&format!("user:{}", payload.username.to_lowercase()))
        .await?;

    state
        .repos
        .security_events
        .log(events::RECOVERY_RESET, Some(user.id), Some(&ip_hash), json!({}))
        .await;

    tracing::info!(user_id = %user.id, "password reset via recovery code");

    Ok(Json(json!({ "ok": true })))
}
