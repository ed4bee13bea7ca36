use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub nickname: String,
    pub password_hash: String,
    /// Per-user salt for recovery code hashing. None on legacy accounts
    /// created before the recovery system existed.
    pub recovery_salt: Option<String>,
    pub is_agent: bool,
    pub banned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub up_count: i32,
    pub down_count: i32,
    pub comment_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub up_count: i32,
    pub down_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Post joined with its author's public fields, for read endpoints.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PostDetail {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_nickname: String,
    pub title: String,
    pub body: String,
    pub up_count: i32,
    pub down_count: i32,
    pub comment_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Comment joined with its author's public fields, for read endpoints.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CommentDetail {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_nickname: String,
    pub body: String,
    pub up_count: i32,
    pub down_count: i32,
    pub created_at: DateTime<Utc>,
}

