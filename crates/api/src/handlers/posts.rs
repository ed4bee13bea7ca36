//! Post endpoints.
//!
//! Creation sits behind the per-user rate limit and a short cooldown so
//! burst-posting (human or scripted) is throttled at the database, not in
//! process memory. Reads are ungated.
//!
//! Endpoints:
//! - POST /posts - Create a post (auth, rate limit, cooldown)
//! - GET /posts?sort=hot|new - List recent posts
//! - GET /posts/{id} - Fetch one post

use axum::{
    Json, Router, debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use garde::Validate;
use serde::Deserialize;
use shared::api::{CreatePostPayload, PostResponse};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::{auth::AuthUser, guards::SameOrigin},
    models::PostDetail,
    ranking::hot_score,
    repos::kst_hour_window,
    state::AppState,
};

/// Posts allowed per user per KST hour.
const POST_LIMIT_PER_HOUR: i64 = 10;

/// Seconds between consecutive posts by one user.
const POST_COOLDOWN_SECS: i64 = 30;

/// How many recent posts the list endpoint considers.
const LIST_WINDOW: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_post).get(list_posts))
        .route("/{id}", get(get_post))
}

fn to_response(detail: PostDetail) -> PostResponse {
    PostResponse {
        id: detail.id,
        author_nickname: detail.author_nickname,
        title: detail.title,
        body: detail.body,
        up: detail.up_count,
        down: detail.down_count,
        comments: detail.comment_count,
        created_at: detail.created_at,
    }
}

#[debug_handler]
async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    _origin: SameOrigin,
    Json(payload): Json<CreatePostPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (window_start, window_secs) = kst_hour_window(Utc::now());
    let decision = state
        .repos
        .rate_limit
        .check_and_incr(
            &format!("posts:{}", user.id),
            POST_LIMIT_PER_HOUR,
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
        .enforce(&format!("post:{}", user.id), POST_COOLDOWN_SECS)
        .await?;

    if !cooldown.ok {
        return Err(AppError::RateLimited {
            retry_after_secs: cooldown.retry_after_secs,
        });
    }

    let created = state
        .repos
        .posts
        .create(user.id, &payload.title, &payload.body)
        .await?;

    // The author's nickname comes from their own record
    let author = state
        .repos
        .users
        .find_by_id(user.id)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    tracing::info!(user_id = %user.id, post_id = %created.id, "post created");

    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            id: created.id,
            author_nickname: author.nickname,
            title: created.title,
            body: created.body,
            up: created.up_count,
            down: created.down_count,
            comments: created.comment_count,
            created_at: created.created_at,
        }),
    ))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    sort: Option<String>,
}

#[debug_handler]
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut posts = state.repos.posts.list_recent(LIST_WINDOW).await?;

    if query.sort.as_deref() == Some("hot") {
        posts.sort_by(|a, b| {
            let score_a = hot_score(a.up_count, a.down_count, a.created_at);
            let score_b = hot_score(b.up_count, b.down_count, b.created_at);
            score_b.total_cmp(&score_a)
        });
    }

    let response: Vec<PostResponse> = posts.into_iter().map(to_response).collect();

    Ok(Json(response))
}

#[debug_handler]
async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let post = state
        .repos
        .posts
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("Post not found"))?;

    Ok(Json(to_response(post)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::{
        CooldownDecision, MockCooldownRepo, MockPostRepo, MockRateLimitRepo, MockUserRepo,
        RateLimitDecision,
    };
    use crate::test_utils::{TestStateBuilder, mock_post_detail, mock_user};

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

    fn payload() -> CreatePostPayload {
        CreatePostPayload {
            title: "몰툭 오픈 기념".into(),
            body: "첫 글입니다".into(),
        }
    }

    #[tokio::test]
    async fn create_post_happy_path() {
        let author = mock_user("moltook_fan");
        let author_id = author.id;

        let mut posts = MockPostRepo::new();
        posts
            .expect_create()
            .returning(|author_id, title, body| Ok(crate::models::Post {
                id: Uuid::new_v4(),
                author_id,
                title: title.to_string(),
                body: body.to_string(),
                up_count: 0,
                down_count: 0,
                comment_count: 0,
                created_at: Utc::now(),
            }));

        let mut users = MockUserRepo::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(author.clone())));

        let state = TestStateBuilder::new()
            .with_rate_limit(allowed_rate_limit())
            .with_cooldown(open_cooldown())
            .with_post_repo(posts)
            .with_user_repo(users)
            .build();

        let result = create_post(
            AuthUser { id: author_id },
            State(state),
            SameOrigin,
            Json(payload()),
        )
        .await
        .unwrap();

        assert_eq!(result.into_response().status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn create_post_rejected_by_rate_limit() {
        let mut rate_limit = MockRateLimitRepo::new();
        rate_limit.expect_check_and_incr().returning(|_, _, _, _| {
            Ok(RateLimitDecision {
                allowed: false,
                count: 11,
                retry_after_secs: 600,
            })
        });

        let state = TestStateBuilder::new().with_rate_limit(rate_limit).build();

        let result = create_post(
            AuthUser { id: Uuid::new_v4() },
            State(state),
            SameOrigin,
            Json(payload()),
        )
        .await;

        let Err(AppError::RateLimited { retry_after_secs }) = result else {
            panic!("Expected RateLimited");
        };
        assert_eq!(retry_after_secs, 600);
    }

    #[tokio::test]
    async fn create_post_rejected_by_cooldown() {
        let mut cooldown = MockCooldownRepo::new();
        cooldown.expect_enforce().returning(|_, _| {
            Ok(CooldownDecision {
                ok: false,
                retry_after_secs: 21,
            })
        });

        let state = TestStateBuilder::new()
            .with_rate_limit(allowed_rate_limit())
            .with_cooldown(cooldown)
            .build();

        let result = create_post(
            AuthUser { id: Uuid::new_v4() },
            State(state),
            SameOrigin,
            Json(payload()),
        )
        .await;

        let Err(AppError::RateLimited { retry_after_secs }) = result else {
            panic!("Expected RateLimited");
        };
        assert_eq!(retry_after_secs, 21);
    }

    #[tokio::test]
    async fn list_posts_hot_orders_by_score() {
        let hot = mock_post_detail("hot post", 500, 0, Utc::now());
        let cold = mock_post_detail("cold post", 0, 3, Utc::now());
        let listed = vec![cold.clone(), hot.clone()];

        let mut posts = MockPostRepo::new();
        posts
            .expect_list_recent()
            .returning(move |_| Ok(listed.clone()));

        let state = TestStateBuilder::new().with_post_repo(posts).build();

        let result = list_posts(
            State(state),
            Query(ListQuery {
                sort: Some("hot".into()),
            }),
        )
        .await
        .unwrap();

        let response = result.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_post_returns_not_found() {
        let mut posts = MockPostRepo::new();
        posts.expect_find_by_id().returning(|_| Ok(None));

        let state = TestStateBuilder::new().with_post_repo(posts).build();

        let result = get_post(State(state), Path(Uuid::new_v4())).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
