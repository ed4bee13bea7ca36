//! Vote endpoints.
//!
//! The toggle semantics live in `crate::vote`; the repository applies them
//! transactionally. Clicking the same direction twice retracts the vote,
//! the opposite direction flips it in one counter update.
//!
//! Endpoints:
//! - POST /posts/{id}/vote
//! - POST /comments/{id}/vote

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    routing::post,
};
use chrono::Utc;
use garde::Validate;
use shared::api::{VotePayload, VoteResponse};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::{auth::AuthUser, guards::SameOrigin},
    repos::{VoteTarget, kst_hour_window},
    state::AppState,
};

/// Votes allowed per user per KST hour.
const VOTE_LIMIT_PER_HOUR: i64 = 60;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/{id}/vote", post(vote_post))
        .route("/comments/{id}/vote", post(vote_comment))
}

#[debug_handler]
async fn vote_post(
    user: AuthUser,
    State(state): State<AppState>,
    _origin: SameOrigin,
    Path(id): Path<Uuid>,
    Json(payload): Json<VotePayload>,
) -> Result<Json<VoteResponse>, AppError> {
    apply_vote(user, state, VoteTarget::Post(id), payload).await
}

#[debug_handler]
async fn vote_comment(
    user: AuthUser,
    State(state): State<AppState>,
    _origin: SameOrigin,
    Path(id): Path<Uuid>,
    Json(payload): Json<VotePayload>,
) -> Result<Json<VoteResponse>, AppError> {
    apply_vote(user, state, VoteTarget::Comment(id), payload).await
}

async fn apply_vote(
    user: AuthUser,
    state: AppState,
    target: VoteTarget,
    payload: VotePayload,
) -> Result<Json<VoteResponse>, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (window_start, window_secs) = kst_hour_window(Utc::now());
    let decision = state
        .repos
        .rate_limit
        .check_and_incr(
            &format!("votes:{}", user.id),
            VOTE_LIMIT_PER_HOUR,
            window_start,
            window_secs,
        )
        .await?;

    if !decision.allowed {
        return Err(AppError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    let counts = state
        .repos
        .votes
        .toggle(user.id, target, payload.value)
        .await?
        .ok_or(AppError::NotFound("Vote target not found"))?;

    Ok(Json(VoteResponse {
        up: counts.up,
        down: counts.down,
        my_vote: counts.my_vote,
    }))
}
