//! Comment repository for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::{Comment, CommentDetail};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentRepo: Send + Sync {
    /// Insert a comment and bump the post's comment counter in one
    /// transaction. Returns None when the post does not exist.
    async fn create(&self, post_id: Uuid, author_id: Uuid, body: &str)
    -> Result<Option<Comment>>;

    async fn list_by_post(&self, post_id: Uuid, limit: i64) -> Result<Vec<CommentDetail>>;
}

/// PostgreSQL implementation of CommentRepo.
#[derive(Clone)]
pub struct PgCommentRepo {
    pool: Pool<Postgres>,
}

impl PgCommentRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepo for PgCommentRepo {
    async fn create(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        body: &str,
    ) -> Result<Option<Comment>> {
        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query("UPDATE posts SET comment_count = comment_count + 1 WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        if bumped.rows_affected() == 0 {
            return Ok(None);
        }

        let comment = sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (post_id, author_id, body) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(comment))
    }

    async fn list_by_post(&self, post_id: Uuid, limit: i64) -> Result<Vec<CommentDetail>> {
        let comments = sqlx::query_as::<_, CommentDetail>(
            "SELECT c.id, c.post_id, c.author_id, u.nickname AS author_nickname, c.body,
                    c.up_count, c.down_count, c.created_at
             FROM comments c JOIN users u ON u.id = c.author_id
             WHERE c.post_id = $1 ORDER BY c.created_at ASC LIMIT $2",
        )
        .bind(post_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }
}
