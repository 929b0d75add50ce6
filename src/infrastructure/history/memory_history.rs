//! In-process fast tier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{Direction, HistorySource, HistoryStore, Message, Page, PageParams};
use crate::shared::error::AppError;

/// Expired chats are dropped on every this many appends.
const SWEEP_EVERY: usize = 64;

#[derive(Debug)]
struct ChatLog {
    /// Ascending by `(created_at, id)`
    messages: Vec<Message>,
    expires_at: Instant,
}

impl ChatLog {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Recent history per chat held in process memory, with the same retention
/// cap and sliding TTL as the Redis tier.
#[derive(Debug)]
pub struct MemoryHistoryStore {
    chats: RwLock<HashMap<i64, ChatLog>>,
    ttl: Duration,
    max_entries: usize,
    appends: AtomicUsize,
}

impl MemoryHistoryStore {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            chats: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            appends: AtomicUsize::new(0),
        }
    }

    /// Messages currently retained for a chat.
    pub fn len(&self, chat_id: i64) -> usize {
        let now = Instant::now();
        self.chats
            .read()
            .get(&chat_id)
            .filter(|log| !log.is_expired(now))
            .map_or(0, |log| log.messages.len())
    }

    /// Chats with a log in memory, expired or not.
    pub fn chat_count(&self) -> usize {
        self.chats.read().len()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, message: &Message) -> Result<(), AppError> {
        let now = Instant::now();
        let mut chats = self.chats.write();
        if (self.appends.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            chats.retain(|_, log| !log.is_expired(now));
        }
        let log = chats.entry(message.chat_id).or_insert_with(|| ChatLog {
            messages: Vec::new(),
            expires_at: now,
        });
        if log.is_expired(now) {
            log.messages.clear();
        }
        log.expires_at = now + self.ttl;

        if log.messages.iter().any(|m| m.id == message.id) {
            return Ok(());
        }
        let key = (message.created_at, message.id);
        let at = log
            .messages
            .partition_point(|m| (m.created_at, m.id) < key);
        log.messages.insert(at, message.clone());

        if log.messages.len() > self.max_entries {
            let excess = log.messages.len() - self.max_entries;
            log.messages.drain(..excess);
        }
        Ok(())
    }

    async fn list(&self, chat_id: i64, params: &PageParams) -> Result<Page<Message>, AppError> {
        let now = Instant::now();
        let chats = self.chats.read();
        let messages: &[Message] = match chats.get(&chat_id) {
            Some(log) if !log.is_expired(now) => log.messages.as_slice(),
            _ => &[],
        };

        let offset = params.offset as usize;
        let limit = params.limit as usize;
        let items: Vec<Message> = match params.direction {
            Direction::Before => {
                let mut page: Vec<Message> = messages
                    .iter()
                    .rev()
                    .filter(|m| params.reference.map_or(true, |at| m.created_at < at))
                    .skip(offset)
                    .take(limit)
                    .cloned()
                    .collect();
                page.reverse();
                page
            }
            Direction::After => messages
                .iter()
                .filter(|m| params.reference.map_or(true, |at| m.created_at > at))
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
        };

        Ok(Page::new(items, params, None, HistorySource::Fast))
    }
}
