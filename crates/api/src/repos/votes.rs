//! Vote repository for PostgreSQL.
//!
//! Applies the pure toggle engine (`crate::vote`) inside one transaction:
//! the target's counter row is locked first, so the vote row mutation and
//! the combined up/down counter update commit together.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::vote::{self, VoteAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Post(Uuid),
    Comment(Uuid),
}

impl VoteTarget {
    fn kind(self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "post",
            VoteTarget::Comment(_) => "comment",
        }
    }

    fn table(self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "posts",
            VoteTarget::Comment(_) => "comments",
        }
    }

    fn id(self) -> Uuid {
        match self {
            VoteTarget::Post(id) | VoteTarget::Comment(id) => id,
        }
    }
}

/// Counter state after a toggle. `my_vote` is 0 when the vote was retracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteCounts {
    pub up: i32,
    pub down: i32,
    pub my_vote: i16,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoteRepo: Send + Sync {
    /// Toggle `user_id`'s vote on the target. Returns None when the target
    /// does not exist.
    async fn toggle(
        &self,
        user_id: Uuid,
        target: VoteTarget,
        next: i16,
    ) -> Result<Option<VoteCounts>>;
}

/// PostgreSQL implementation of VoteRepo.
#[derive(Clone)]
pub struct PgVoteRepo {
    pool: Pool<Postgres>,
}

impl PgVoteRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoteRepo for PgVoteRepo {
    async fn toggle(
        &self,
        user_id: Uuid,
        target: VoteTarget,
        next: i16,
    ) -> Result<Option<VoteCounts>> {
        let mut tx = self.pool.begin().await?;

        // Lock the target row; concurrent toggles on the same target
        // serialize here.
        let exists: Option<(Uuid,)> = sqlx::query_as(&format!(
            "SELECT id FROM {} WHERE id = $1 FOR UPDATE",
            target.table()
        ))
        .bind(target.id())
        .fetch_optional(&mut *tx)
        .await?;

        if exists.is_none() {
            return Ok(None);
        }

        let existing: Option<(i16,)> = sqlx::query_as(
            "SELECT value FROM votes
             WHERE user_id = $1 AND target_kind = $2 AND target_id = $3",
        )
        .bind(user_id)
        .bind(target.kind())
        .bind(target.id())
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = vote::toggle(existing.map(|(v,)| v), next);

        match outcome.action {
            VoteAction::Create => {
                sqlx::query(
                    "INSERT INTO votes (user_id, target_kind, target_id, value)
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(user_id)
                .bind(target.kind())
                .bind(target.id())
                .bind(outcome.next_value)
                .execute(&mut *tx)
                .await?;
            }
            VoteAction::Update => {
                sqlx::query(
                    "UPDATE votes SET value = $4
                     WHERE user_id = $1 AND target_kind = $2 AND target_id = $3",
                )
                .bind(user_id)
                .bind(target.kind())
                .bind(target.id())
                .bind(outcome.next_value)
                .execute(&mut *tx)
                .await?;
            }
            VoteAction::Delete => {
                sqlx::query(
                    "DELETE FROM votes
                     WHERE user_id = $1 AND target_kind = $2 AND target_id = $3",
                )
                .bind(user_id)
                .bind(target.kind())
                .bind(target.id())
                .execute(&mut *tx)
                .await?;
            }
        }

        let (up, down): (i32, i32) = sqlx::query_as(&format!(
            "UPDATE {} SET up_count = up_count + $2, down_count = down_count + $3
             WHERE id = $1 RETURNING up_count, down_count",
            target.table()
        ))
        .bind(target.id())
        .bind(outcome.delta_up)
        .bind(outcome.delta_down)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(VoteCounts {
            up,
            down,
            my_vote: outcome.next_value,
        }))
    }
}
