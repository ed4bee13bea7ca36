//! Authentication middleware backed by database sessions.
//!
//! Usage: Add `AuthUser` as an extractor parameter to require authentication.
//! The bearer token is hashed and looked up in the sessions table; banned
//! accounts are rejected even with a valid session.
//!
//! ```ignore
//! async fn my_handler(user: AuthUser, ...) -> ... {
//!     // user.id is available here
//! }
//! ```

use axum::{RequestPartsExt, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use uuid::Uuid;

use crate::{error::AppError, identity, state::AppState};

/// Authenticated user extracted from a valid session token.
pub struct AuthUser {
    pub id: Uuid,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Unauthorized("Missing authorization token"))?;

        let token_hash = identity::token_hash(bearer.token());

        let session = state
            .repos
            .sessions
            .find_valid(&token_hash)
            .await?
            .ok_or(AppError::Unauthorized("Invalid or expired token"))?;

        let user = state
            .repos
            .users
            .find_by_id(session.user_id)
            .await?
            .ok_or(AppError::Unauthorized("Invalid or expired token"))?;

        if user.banned_at.is_some() {
            return Err(AppError::Forbidden("Account is banned"));
        }

        Ok(AuthUser { id: user.id })
    }
}
