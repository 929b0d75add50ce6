//! History Store Tiers
//!
//! - **RedisHistoryStore** / **MemoryHistoryStore**: bounded fast tier
//! - **PgMessageRepository** (in `repositories`): unbounded durable tier
//! - **TieredHistoryStore**: reads fast then durable behind one `HistoryStore`

mod memory_history;
mod redis_history;
mod tiered;

pub use memory_history::MemoryHistoryStore;
pub use redis_history::RedisHistoryStore;
pub use tiered::TieredHistoryStore;

use crate::domain::Message;

/// Order a page by creation time, id breaking ties.
pub(crate) fn sort_ascending(messages: &mut [Message]) {
    messages.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
}
