//! Redis sorted-set fast tier.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, instrument, warn};

use super::sort_ascending;
use crate::domain::{Direction, HistorySource, HistoryStore, Message, Page, PageParams};
use crate::infrastructure::cache::keys;
use crate::shared::error::AppError;

/// Recent history of each chat in a ZSET scored by creation time in
/// milliseconds. Each member is the JSON-encoded message.
#[derive(Clone)]
pub struct RedisHistoryStore {
    conn: ConnectionManager,
    ttl_secs: u64,
    max_entries: usize,
}

impl RedisHistoryStore {
    pub fn new(conn: ConnectionManager, ttl_secs: u64, max_entries: usize) -> Self {
        Self {
            conn,
            ttl_secs,
            max_entries,
        }
    }
}

/// Score bounds for a page, as `(near, far)` in the order Redis wants them
/// for the page direction.
fn score_bounds(params: &PageParams) -> (String, String) {
    let reference = params
        .reference
        .map(|at| format!("({}", at.timestamp_millis()));
    match params.direction {
        Direction::Before => (
            reference.unwrap_or_else(|| "+inf".to_string()),
            "-inf".to_string(),
        ),
        Direction::After => (
            reference.unwrap_or_else(|| "-inf".to_string()),
            "+inf".to_string(),
        ),
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    #[instrument(
        skip(self, message),
        fields(chat_id = message.chat_id, message_id = message.id),
        level = "debug",
    )]
    async fn append(&self, message: &Message) -> Result<(), AppError> {
        let key = keys::chat_messages(message.chat_id);
        let payload = serde_json::to_string(message)?;
        let score = message.created_at.timestamp_millis();
        let keep = self.max_entries as isize;
        let mut conn = self.conn.clone();

        let _: () = redis::pipe()
            .atomic()
            .zadd(&key, payload, score)
            .ignore()
            .zremrangebyrank(&key, 0, -keep - 1)
            .ignore()
            .expire(&key, self.ttl_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!(key = %key, "Message cached");
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(&self, chat_id: i64, params: &PageParams) -> Result<Page<Message>, AppError> {
        let key = keys::chat_messages(chat_id);
        let (near, far) = score_bounds(params);
        let offset = params.offset as isize;
        let count = params.limit as isize;
        let mut conn = self.conn.clone();

        let mut cmd = match params.direction {
            Direction::Before => redis::cmd("ZREVRANGEBYSCORE"),
            Direction::After => redis::cmd("ZRANGEBYSCORE"),
        };
        cmd.arg(&key)
            .arg(&near)
            .arg(&far)
            .arg("LIMIT")
            .arg(offset)
            .arg(count);
        let raw: Vec<String> = cmd.query_async(&mut conn).await?;

        let mut items: Vec<Message> = raw
            .iter()
            .filter_map(|entry| match serde_json::from_str(entry) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping undecodable history entry");
                    None
                }
            })
            .collect();
        sort_ascending(&mut items);

        Ok(Page::new(items, params, None, HistorySource::Fast))
    }
}

impl std::fmt::Debug for RedisHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisHistoryStore")
            .field("ttl_secs", &self.ttl_secs)
            .field("max_entries", &self.max_entries)
            .finish_non_exhaustive()
    }
}
