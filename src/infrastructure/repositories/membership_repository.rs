//! Membership Repository Implementation
//!
//! Read-only PostgreSQL view of the `chat_members` table.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{instrument, warn};

use crate::domain::{ChatMembership, MembershipOracle, MembershipStatus};
use crate::shared::error::AppError;

/// Database row representation of the chat_members table.
#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    user_id: i64,
    chat_id: i64,
    status: String,
}

impl MembershipRow {
    fn into_membership(self) -> Option<ChatMembership> {
        let Some(status) = MembershipStatus::parse(&self.status) else {
            warn!(
                user_id = self.user_id,
                chat_id = self.chat_id,
                status = %self.status,
                "Unrecognized membership status"
            );
            return None;
        };
        Some(ChatMembership {
            user_id: self.user_id,
            chat_id: self.chat_id,
            status,
        })
    }
}

/// PostgreSQL membership oracle.
#[derive(Clone)]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    /// Create a new PgMembershipRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user's membership row in a chat.
    pub async fn find(
        &self,
        user_id: i64,
        chat_id: i64,
    ) -> Result<Option<ChatMembership>, AppError> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT user_id, chat_id, status
            FROM chat_members
            WHERE user_id = $1 AND chat_id = $2
            "#,
        )
        .bind(user_id)
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(MembershipRow::into_membership))
    }
}

#[async_trait]
impl MembershipOracle for PgMembershipRepository {
    #[instrument(skip(self), level = "debug")]
    async fn is_active_member(&self, user_id: i64, chat_id: i64) -> Result<bool, AppError> {
        Ok(self
            .find(user_id, chat_id)
            .await?
            .is_some_and(|membership| membership.is_active()))
    }

    #[instrument(skip(self), level = "debug")]
    async fn active_chats_of(&self, user_id: i64) -> Result<HashSet<i64>, AppError> {
        let chats = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT chat_id FROM chat_members
            WHERE user_id = $1 AND status = $2
            "#,
        )
        .bind(user_id)
        .bind(MembershipStatus::InChat.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(chats.into_iter().collect())
    }
}
