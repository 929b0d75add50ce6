//! Message Bus Bindings
//!
//! Concrete transports for the `MessageBus` contract:
//!
//! - **RedisMessageBus**: Redis pub/sub. Publishes go through the shared
//!   connection manager; each subscription owns a dedicated pub/sub
//!   connection.
//! - **InMemoryMessageBus**: single-process fan-out for development and tests.
//!
//! Both put JSON on the wire and decode it back into a `Message` before it
//! reaches a session.

mod memory_bus;
mod redis_bus;

pub use memory_bus::{InMemoryMessageBus, MemorySubscription};
pub use redis_bus::{RedisMessageBus, RedisSubscription};

use std::collections::HashSet;

use crate::domain::{Message, Topic};
use crate::shared::error::BusError;

/// Wire encoding of a message.
pub(crate) fn encode_message(message: &Message) -> Result<Vec<u8>, BusError> {
    Ok(serde_json::to_vec(message)?)
}

/// Turn a wire payload back into a message.
pub(crate) fn decode_message(payload: &[u8]) -> Result<Message, BusError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Initial topic set of a new subscription: the requested topics plus the
/// broadcast topic, without duplicates.
pub(crate) fn initial_topics(topics: Vec<Topic>) -> Vec<Topic> {
    let mut seen = HashSet::new();
    std::iter::once(Topic::broadcast())
        .chain(topics)
        .filter(|topic| seen.insert(topic.clone()))
        .collect()
}
