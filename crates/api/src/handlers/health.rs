//! Liveness probe.
//!
//! Reports each backing store separately so an operator can tell a dead
//! Postgres from a dead Redis at a glance. Unhealthy answers 503, which is
//! what load balancers key on.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    postgres: bool,
    redis: bool,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let postgres = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.database)
        .await
        .is_ok();

    let redis = match state.redis.get_multiplexed_async_connection().await {
        Ok(mut conn) => redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok(),
        Err(_) => false,
    };

    if !postgres || !redis {
        tracing::warn!(postgres, redis, "health probe failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Health {
                status: "degraded",
                postgres,
                redis,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(Health {
            status: "ok",
            postgres,
            redis,
        }),
    )
}
