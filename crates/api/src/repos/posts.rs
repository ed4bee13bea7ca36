//! Post repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::{Post, PostDetail};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn create(&self, author_id: Uuid, title: &str, body: &str) -> Result<Post>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostDetail>>;

    /// Most recent posts, newest first. Hot ordering is computed by the
    /// caller over this window.
    async fn list_recent(&self, limit: i64) -> Result<Vec<PostDetail>>;
}

const DETAIL_COLUMNS: &str = "p.id, p.author_id, u.nickname AS author_nickname, p.title, p.body,
     p.up_count, p.down_count, p.comment_count, p.created_at";

/// PostgreSQL implementation of PostRepo.
#[derive(Clone)]
pub struct PgPostRepo {
    pool: Pool<Postgres>,
}

impl PgPostRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepo for PgPostRepo {
    async fn create(&self, author_id: Uuid, title: &str, body: &str) -> Result<Post> {
        let post = sqlx::query_as::<_, Post>(
            "INSERT INTO posts (author_id, title, body) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(author_id)
        .bind(title)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostDetail>> {
        let post = sqlx::query_as::<_, PostDetail>(&format!(
            "SELECT {DETAIL_COLUMNS} FROM posts p JOIN users u ON u.id = p.author_id
             WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<PostDetail>> {
        let posts = sqlx::query_as::<_, PostDetail>(&format!(
            "SELECT {DETAIL_COLUMNS} FROM posts p JOIN users u ON u.id = p.author_id
             ORDER BY p.created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }
}
