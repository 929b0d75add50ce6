//! Message Repository Implementation
//!
//! PostgreSQL durable tier of the message history, paginated by creation
//! time with `OFFSET/LIMIT` and a total count of the window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use crate::domain::{
    Direction, HistorySource, HistoryStore, Message, MessageAction, Page, PageParams,
};
use crate::shared::error::AppError;

/// PostgreSQL message repository implementation.
///
/// Holds every message ever appended; pages come back ascending regardless
/// of direction.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count_window(&self, chat_id: i64, params: &PageParams) -> Result<i64, AppError> {
        let total = match params.direction {
            Direction::Before => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*) FROM messages
                    WHERE chat_id = $1 AND ($2::timestamptz IS NULL OR created_at < $2)
                    "#,
                )
                .bind(chat_id)
                .bind(params.reference)
                .fetch_one(&self.pool)
                .await?
            }
            Direction::After => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*) FROM messages
                    WHERE chat_id = $1 AND ($2::timestamptz IS NULL OR created_at > $2)
                    "#,
                )
                .bind(chat_id)
                .bind(params.reference)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(total)
    }
}

/// Internal row type for message queries.
/// Maps to the messages table schema defined in the migration.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    chat_id: i64,
    sender_id: i64,
    target_id: Option<i64>,
    action: String,
    text: String,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    /// Converts database row to domain Message entity.
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            action: MessageAction::parse(&self.action),
            text: self.text,
            chat_id: self.chat_id,
            sender_id: self.sender_id,
            target_id: self.target_id,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl HistoryStore for PgMessageRepository {
    /// Insert a message. Re-inserting an existing id is a no-op.
    #[instrument(
        skip(self, message),
        fields(chat_id = message.chat_id, message_id = message.id),
        level = "debug",
    )]
    async fn append(&self, message: &Message) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, chat_id, sender_id, target_id, action, text, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(message.id)
        .bind(message.chat_id)
        .bind(message.sender_id)
        .bind(message.target_id)
        .bind(message.action.as_str())
        .bind(&message.text)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(&self, chat_id: i64, params: &PageParams) -> Result<Page<Message>, AppError> {
        let offset = i64::from(params.offset);
        let limit = i64::from(params.limit);

        let rows = match params.direction {
            Direction::Before => {
                // Newest first from the reference, reversed below
                sqlx::query_as::<_, MessageRow>(
                    r#"
                    SELECT id, chat_id, sender_id, target_id, action, text, created_at
                    FROM messages
                    WHERE chat_id = $1 AND ($2::timestamptz IS NULL OR created_at < $2)
                    ORDER BY created_at DESC, id DESC
                    OFFSET $3
                    LIMIT $4
                    "#,
                )
                .bind(chat_id)
                .bind(params.reference)
                .bind(offset)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            Direction::After => {
                sqlx::query_as::<_, MessageRow>(
                    r#"
                    SELECT id, chat_id, sender_id, target_id, action, text, created_at
                    FROM messages
                    WHERE chat_id = $1 AND ($2::timestamptz IS NULL OR created_at > $2)
                    ORDER BY created_at ASC, id ASC
                    OFFSET $3
                    LIMIT $4
                    "#,
                )
                .bind(chat_id)
                .bind(params.reference)
                .bind(offset)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut items: Vec<Message> = rows.into_iter().map(|r| r.into_message()).collect();
        if params.direction == Direction::Before {
            items.reverse();
        }

        let total = self.count_window(chat_id, params).await?;
        Ok(Page::new(
            items,
            params,
            Some(total.max(0) as u64),
            HistorySource::Durable,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion_keeps_unknown_action() {
        let row = MessageRow {
            id: 1,
            chat_id: 2,
            sender_id: 3,
            target_id: Some(4),
            action: "promote".into(),
            text: String::new(),
            created_at: Utc::now(),
        };
        let message = row.into_message();
        assert_eq!(message.action, MessageAction::Unknown);
        assert_eq!(message.affected_user(), 4);
    }
}
