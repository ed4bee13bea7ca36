use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub enum AppError {
    /// Internal errors - logged but return generic 500 to user
    Internal(anyhow::Error),
    /// Malformed or missing input - message is safe to show
    Validation(String),
    Unauthorized(&'static str),
    /// Banned accounts, cross-origin requests, unresolvable client IPs
    Forbidden(&'static str),
    NotFound(&'static str),
    /// Uniqueness collisions (e.g. username already taken)
    Conflict(&'static str),
    /// Always carries a Retry-After header
    RateLimited { retry_after_secs: i64 },
    /// Anti-abuse gate rejections with a machine-readable code
    Gate {
        status: StatusCode,
        code: &'static str,
        message: &'static str,
    },
}

impl AppError {
    /// 400 gate rejection. Use the `Gate` variant directly for other statuses.
    pub fn gate(code: &'static str, message: &'static str) -> Self {
        Self::Gate {
            status: StatusCode::BAD_REQUEST,
            code,
            message,
        }
    }
}

fn error_body(code: &str, message: &str) -> Json<serde_json::Value> {
    Json(json!({ "ok": false, "error": { "code": code, "message": message } }))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Internal(err) => {
                tracing::error!("internal error: {:?}", err);
                sentry::capture_error(
                    err.as_ref() as &(dyn std::error::Error + Send + Sync + 'static)
                );

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("INTERNAL", "Internal server error"),
                )
                    .into_response()
            }
            AppError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                error_body("VALIDATION_ERROR", &msg),
            )
                .into_response(),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, error_body("UNAUTHORIZED", msg)).into_response()
            }
            AppError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, error_body("FORBIDDEN", msg)).into_response()
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, error_body("NOT_FOUND", msg)).into_response()
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, error_body("CONFLICT", msg)).into_response()
            }
            AppError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                [(axum::http::header::RETRY_AFTER, retry_after_secs.to_string())],
                error_body("RATE_LIMITED", "Too many requests. Try again later."),
            )
                .into_response(),
            AppError::Gate {
                status,
                code,
                message,
            } => (status, error_body(code, message)).into_response(),
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}
