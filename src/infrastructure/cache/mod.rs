//! Cache Module
//!
//! Redis connection management and caching utilities.
//!
//! This module provides:
//! - Redis connection management with automatic reconnection
//! - A generic `Cache` trait for abstracting cache operations
//! - A `RedisCache` implementation
//! - Key builders for consistent cache key naming
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! |   Application     |
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! |   Cache Trait     |  <-- Abstract interface
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! |   RedisCache      |  <-- Concrete implementation
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! | ConnectionManager |  <-- Shared multiplexed connection
//! +-------------------+
//! ```

mod cache_service;

pub use cache_service::{Cache, RedisCache};

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Opens a Redis client handle. Does not connect.
pub fn open_redis_client(settings: &RedisSettings) -> Result<Client, redis::RedisError> {
    Client::open(settings.url.as_str())
}

/// Creates a Redis connection manager with automatic reconnection.
///
/// # Returns
/// * `Ok(ConnectionManager)` - On successful connection
/// * `Err(redis::RedisError)` - If connection fails
#[instrument(skip(client))]
pub async fn create_connection_manager(
    client: &Client,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let manager = ConnectionManager::new(client.clone()).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Cache key layout.
///
/// ```rust,ignore
/// use chat_fanout::infrastructure::cache::keys;
///
/// let key = keys::chat_messages(42); // "chat:42:messages"
/// ```
pub mod keys {
    /// Prefix for per-chat keys (e.g., "chat:chat_id:messages")
    pub const CHAT: &str = "chat:";

    /// Prefix for membership answers (e.g., "membership:chat_id:user_id")
    pub const MEMBERSHIP: &str = "membership:";

    /// Sorted set of a chat's recent messages, scored by creation time
    #[inline]
    pub fn chat_messages(chat_id: impl std::fmt::Display) -> String {
        format!("{}{}:messages", CHAT, chat_id)
    }

    /// Cached membership answer for a user in a chat
    #[inline]
    pub fn membership(chat_id: impl std::fmt::Display, user_id: impl std::fmt::Display) -> String {
        format!("{}{}:{}", MEMBERSHIP, chat_id, user_id)
    }

}
