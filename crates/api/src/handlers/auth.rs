//! Account creation and password authentication.
//!
//! Signup runs the full anti-abuse gauntlet before any row is written:
//! 1. Same-origin and client IP guards
//! 2. Per-IP rate limit (fixed KST-day window)
//! 3. Proof-of-work token verification (stateless, HMAC-signed)
//! 4. Captcha verification (id from the HTTP-only cookie, single use)
//! 5. Per-IP and per-device signup lock reservation
//! 6. Account creation, lock binding, recovery code issuance
//!
//! A gate rejection returns immediately; the account mutation never runs.
//! Login sits behind the escalating failure lockout: ten cumulative failures
//! lock the credential key for fifteen minutes, and a successful login
//! clears the counter.
//!
//! Security notes:
//! - Recovery codes are returned exactly once, at signup; only per-user
//!   salted hashes are stored
//! - Login failures are indistinguishable between unknown-username and
//!   wrong-password (no account enumeration)
//! - Session tokens are stored hashed; a database dump cannot be replayed

use axum::{
    Json, Router, debug_handler,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use axum_extra::{
    TypedHeader,
    extract::cookie::CookieJar,
    headers::{Authorization, authorization::Bearer},
};
use chrono::Utc;
use garde::Validate;
use serde_json::json;
use shared::api::{LoginPayload, LoginResponse, SignupPayload, SignupResponse};

use crate::{
    captcha,
    error::AppError,
    handlers::challenge::CAPTCHA_COOKIE,
    identity,
    middleware::guards::{ClientIp, SameOrigin},
    pow,
    repos::{LockKind, ReserveOutcome, events, kst_day_window},
    state::AppState,
};

/// Signups allowed per IP per KST day.
const SIGNUP_LIMIT_PER_DAY: i64 = 5;

/// How many one-time recovery codes a fresh account receives.
const RECOVERY_CODE_COUNT: usize = 8;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

fn lockout_key(username: &str) -> String {
    format!("user:{}", username.to_lowercase())
}

#[debug_handler]
async fn signup(
    State(state): State<AppState>,
    _origin: SameOrigin,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Json(payload): Json<SignupPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let ip_hash = identity::ip_hash(&state.config.hash_pepper, &ip);

    // Gate 1: fixed-window rate limit per IP
    let (window_start, window_secs) = kst_day_window(Utc::now());
    let decision = state
        .repos
        .rate_limit
        .check_and_incr(
            &format!("signup:{ip_hash}"),
            SIGNUP_LIMIT_PER_DAY,
            window_start,
            window_secs,
        )
        .await?;

    if !decision.allowed {
        return Err(AppError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    // Gate 2: proof-of-work
    if state.config.pow_enabled {
        let (token, solution) = match (&payload.pow_token, &payload.pow_solution) {
            (Some(token), Some(solution)) => (token, solution),
            _ => {
                return Err(AppError::gate(
                    "POW_REQUIRED",
                    "A proof-of-work solution is required",
                ));
            }
        };

        if let Err(e) = pow::verify(
            state.config.pow_secret.as_bytes(),
            token,
            solution,
            Utc::now(),
        ) {
            tracing::warn!(reason = e.as_code(), "signup rejected: proof-of-work");
            return Err(AppError::gate("POW_INVALID", e.as_code()));
        }
    }

    // Gate 3: captcha. The id comes from the HTTP-only cookie, never the body.
    let captcha_id = jar
        .get(CAPTCHA_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::gate("CAPTCHA_REQUIRED", "Captcha challenge is required"))?;

    let challenge = state
        .stores
        .captcha
        .get(&captcha_id)
        .await?
        .ok_or_else(|| AppError::gate("CAPTCHA_INVALID", "Captcha expired or unknown"))?;

    // The answer must match and the challenge must belong to this IP
    if challenge.ip_hash != ip_hash || !captcha::matches(&payload.captcha_text, &challenge.answer)
    {
        tracing::warn!("signup rejected: captcha mismatch");
        return Err(AppError::gate("CAPTCHA_INVALID", "Captcha answer is wrong"));
    }

    // Consumed only after full validation
    state.stores.captcha.delete(&captcha_id).await?;

    // Gate 4: signup locks, IP family first
    let reservation_secs = state.config.signup_reservation_secs;
    let ip_outcome = state
        .repos
        .signup_locks
        .reserve(
            LockKind::Ip,
            &ip_hash,
            reservation_secs,
            state.config.signup_max_accounts_per_ip,
        )
        .await?;

    if let Some(err) = reserve_rejection(&state, events::SIGNUP_BLOCKED, &ip_hash, "ip", ip_outcome).await {
        return Err(err);
    }

    let device_hash = payload
        .device_id
        .as_deref()
        .map(|device_id| identity::device_hash(&state.config.hash_pepper, device_id));

    if let Some(device_hash) = &device_hash {
        let outcome = state
            .repos
            .signup_locks
            .reserve(
                LockKind::Device,
                device_hash,
                reservation_secs,
                state.config.signup_max_accounts_per_device,
            )
            .await?;

        if let Some(err) =
            reserve_rejection(&state, events::SIGNUP_BLOCKED, &ip_hash, "device", outcome).await
        {
            return Err(err);
        }
    }

    // Gates passed; create the account
    let password = payload.password.clone();
    let password_hash =
        tokio::task::spawn_blocking(move || bcrypt::hash(&password, bcrypt::DEFAULT_COST))
            .await
            .map_err(|e| anyhow::anyhow!("password hashing task failed: {e}"))??;

    let recovery_salt = identity::generate_recovery_salt();

    let user = state
        .repos
        .users
        .create(
            &payload.username,
            &payload.nickname,
            &password_hash,
            &recovery_salt,
            payload.is_agent,
        )
        .await?
        .ok_or(AppError::Conflict("Username already taken"))?;

    state
        .repos
        .signup_locks
        .bind(LockKind::Ip, &ip_hash, user.id)
        .await?;

    if let Some(device_hash) = &device_hash {
        state
            .repos
            .signup_locks
            .bind(LockKind::Device, device_hash, user.id)
            .await?;
    }

    let recovery_codes: Vec<String> = (0..RECOVERY_CODE_COUNT)
        .map(|_| identity::generate_recovery_code())
        .collect();
    let code_hashes: Vec<String> = recovery_codes
        .iter()
        .map(|code| identity::recovery_code_hash(code, &recovery_salt))
        .collect();

    state.repos.recovery.issue(user.id, &code_hashes).await?;

    let token = identity::generate_session_token();
    state
        .repos
        .sessions
        .create(
            user.id,
            &identity::token_hash(&token),
            state.config.session_ttl_hours,
        )
        .await?;

    state
        .repos
        .security_events
        .log(
            events::SIGNUP,
            Some(user.id),
            Some(&ip_hash),
            json!({ "is_agent": payload.is_agent, "device_bound": device_hash.is_some() }),
        )
        .await;

    tracing::info!(user_id = %user.id, username = %user.username, "account created");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user_id: user.id,
            token,
            recovery_codes,
        }),
    ))
}

/// Map a lock reservation rejection to its gate error, logging the block.
/// Returns None when the reservation was allowed.
async fn reserve_rejection(
    state: &AppState,
    event: &str,
    ip_hash: &str,
    family: &str,
    outcome: ReserveOutcome,
) -> Option<AppError> {
    let (code, message) = match outcome {
        ReserveOutcome::Allowed => return None,
        ReserveOutcome::Reserved { .. } => (
            "SIGNUP_RESERVED",
            "Another signup from this network or device is in progress",
        ),
        ReserveOutcome::Limit => (
            "SIGNUP_LIMIT",
            "Account limit reached for this network or device",
        ),
    };

    state
        .repos
        .security_events
        .log(event, None, Some(ip_hash), json!({ "family": family, "code": code }))
        .await;

    Some(AppError::Gate {
        status: StatusCode::FORBIDDEN,
        code,
        message,
    })
}

#[debug_handler]
async fn login(
    State(state): State<AppState>,
    _origin: SameOrigin,
    ClientIp(ip): ClientIp,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let ip_hash = identity::ip_hash(&state.config.hash_pepper, &ip);
    let lock_key = lockout_key(&payload.username);

    let status = state.repos.auth_lock.check(&lock_key).await?;
    if status.locked {
        state
            .repos
            .security_events
            .log(events::LOGIN_LOCKED, None, Some(&ip_hash), json!({}))
            .await;
        return Err(AppError::RateLimited {
            retry_after_secs: status.retry_after_secs,
        });
    }

    let user = state.repos.users.find_by_username(&payload.username).await?;

    let verified = match &user {
        Some(user) => {
            let password = payload.password.clone();
            let hash = user.password_hash.clone();
            tokio::task::spawn_blocking(move || bcrypt::verify(&password, &hash))
                .await
                .map_err(|e| anyhow::anyhow!("password verify task failed: {e}"))??
        }
        // Unknown usernames burn a failure too, and answer identically
        None => false,
    };

    if !verified {
        let status = state.repos.auth_lock.record_failure(&lock_key).await?;
        state
            .repos
            .security_events
            .log(events::LOGIN_FAILED, None, Some(&ip_hash), json!({}))
            .await;

        if status.locked {
            return Err(AppError::RateLimited {
                retry_after_secs: status.retry_after_secs,
            });
        }
        return Err(AppError::Unauthorized("Invalid username or password"));
    }

    let Some(user) = user else {
        return Err(AppError::Unauthorized("Invalid username or password"));
    };

    if user.banned_at.is_some() {
        return Err(AppError::Forbidden("Account is banned"));
    }

    state.repos.auth_lock.clear(&lock_key).await?;

    let token = identity::generate_session_token();
    state
        .repos
        .sessions
        .create(
            user.id,
            &identity::token_hash(&token),
            state.config.session_ttl_hours,
        )
        .await?;

    state
        .repos
        .security_events
        .log(events::LOGIN_SUCCESS, Some(user.id), Some(&ip_hash), json!({}))
        .await;

    tracing::info!(user_id = %user.id, "login");

    Ok(Json(LoginResponse {
        user_id: user.id,
        token,
        nickname: user.nickname,
    }))
}

/// Delete the bearer session. Idempotent.
#[debug_handler]
async fn logout(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Result<impl IntoResponse, AppError> {
    state
        .repos
        .sessions
        .delete(&identity::token_hash(bearer.token()))
        .await?;

    Ok(StatusCode::OK)
}
