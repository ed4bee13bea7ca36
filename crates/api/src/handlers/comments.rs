//! Comment endpoints, nested under /posts.
//!
//! Endpoints:
//! - POST /posts/{id}/comments - Create a comment (auth, rate limit, cooldown)
//! - GET /posts/{id}/comments - List a post's comments

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use garde::Validate;
use shared::api::{CommentResponse, CreateCommentPayload};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::{auth::AuthUser, guards::SameOrigin},
    repos::kst_hour_window,
    state::AppState,
};

/// Comments allowed per user per KST hour.
const COMMENT_LIMIT_PER_HOUR: i64 = 30;

/// Seconds between consecutive comments by one user.
const COMMENT_COOLDOWN_SECS: i64 = 10;

const LIST_WINDOW: i64 = 200;

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/comments", get(list_comments).post(create_comment))
}

#[debug_handler]
async fn create_comment(
    user: AuthUser,
    State(state): State<AppState>,
    _origin: SameOrigin,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CreateCommentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (window_start, window_secs) = kst_hour_window(Utc::now());
    let decision = state
        .repos
        .rate_limit
        .check_and_incr(
            &format!("comments:{}", user.id),
            COMMENT_LIMIT_PER_HOUR,
            window_start,
            window_secs,
        )
        .await?;

    if !decision.allowed {
        return Err(AppError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    let cooldown = state
        .repos
        .cooldown
        .enforce(&format!("comment:{}", user.id), COMMENT_COOLDOWN_SECS)
        .await?;

    if !cooldown.ok {
        return Err(AppError::RateLimited {
            retry_after_secs: cooldown.retry_after_secs,
        });
    }

    let comment = state
        .repos
        .comments
        .create(post_id, user.id, &payload.body)
        .await?
        .ok_or(AppError::NotFound("Post not found"))?;

    let author = state
        .repos
        .users
        .find_by_id(user.id)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    tracing::info!(user_id = %user.id, post_id = %post_id, comment_id = %comment.id, "comment created");

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            id: comment.id,
            post_id: comment.post_id,
            author_nickname: author.nickname,
            body: comment.body,
            up: comment.up_count,
            down: comment.down_count,
            created_at: comment.created_at,
        }),
    ))
}

#[debug_handler]
async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let comments = state
        .repos
        .comments
        .list_by_post(post_id, LIST_WINDOW)
        .await?;

    let response: Vec<CommentResponse> = comments
        .into_iter()
        .map(|c| CommentResponse {
            id: c.id,
            post_id: c.post_id,
            author_nickname: c.author_nickname,
            body: c.body,
            up: c.up_count,
            down: c.down_count,
            created_at: c.created_at,
        })
        .collect();

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Comment;
    use crate::repos::{
        CooldownDecision, MockCommentRepo, MockCooldownRepo, MockRateLimitRepo, MockUserRepo,
        RateLimitDecision,
    };
    use crate::test_utils::{TestStateBuilder, mock_user};

    fn allowed_rate_limit() -> MockRateLimitRepo {
        let mut rate_limit = MockRateLimitRepo::new();
        rate_limit.expect_check_and_incr().returning(|_, _, _, _| {
            Ok(RateLimitDecision {
                allowed: true,
                count: 1,
                retry_after_secs: 0,
            })
        });
        rate_limit
    }

    fn open_cooldown() -> MockCooldownRepo {
        let mut cooldown = MockCooldownRepo::new();
        cooldown.expect_enforce().returning(|_, _| {
            Ok(CooldownDecision {
                ok: true,
                retry_after_secs: 0,
            })
        });
        cooldown
    }

    #[tokio::test]
    async fn create_comment_happy_path() {
        let author = mock_user("moltook_fan");
        let author_id = author.id;

        let mut comments = MockCommentRepo::new();
        comments
            .expect_create()
            .returning(|post_id, author_id, body| {
                Ok(Some(Comment {
                    id: Uuid::new_v4(),
                    post_id,
                    author_id,
                    body: body.to_string(),
                    up_count: 0,
                    down_count: 0,
                    created_at: Utc::now(),
                }))
            });

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(author.clone())));

        let state = TestStateBuilder::new()
            .with_rate_limit(allowed_rate_limit())
            .with_cooldown(open_cooldown())
            .with_comment_repo(comments)
            .with_user_repo(users)
            .build();

        let result = create_comment(
            AuthUser { id: author_id },
            State(state),
            SameOrigin,
            Path(Uuid::new_v4()),
            Json(CreateCommentPayload {
                body: "첫 댓글".into(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(result.into_response().status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn create_comment_on_missing_post_is_not_found() {
        let mut comments = MockCommentRepo::new();
        comments.expect_create().returning(|_, _, _| Ok(None));

        let state = TestStateBuilder::new()
            .with_rate_limit(allowed_rate_limit())
            .with_cooldown(open_cooldown())
            .with_comment_repo(comments)
            .build();

        let result = create_comment(
            AuthUser { id: Uuid::new_v4() },
            State(state),
            SameOrigin,
            Path(Uuid::new_v4()),
            Json(CreateCommentPayload {
                body: "어디 갔지".into(),
            }),
        )
        .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_comment_rejected_by_cooldown() {
        let mut cooldown = MockCooldownRepo::new();
        cooldown.expect_enforce().returning(|_, _| {
            Ok(CooldownDecision {
                ok: false,
                retry_after_secs: 7,
            })
        });

        let state = TestStateBuilder::new()
            .with_rate_limit(allowed_rate_limit())
            .with_cooldown(cooldown)
            .build();

        let result = create_comment(
            AuthUser { id: Uuid::new_v4() },
            State(state),
            SameOrigin,
            Path(Uuid::new_v4()),
            Json(CreateCommentPayload {
                body: "빨리빨리".into(),
            }),
        )
        .await;

        let Err(AppError::RateLimited { retry_after_secs }) = result else {
            panic!("Expected RateLimited");
        };
        assert_eq!(retry_after_secs, 7);
    }
}
