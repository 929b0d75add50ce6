//! Pub/sub topic names.
//!
//! Every chat has exactly one topic; one more reserved topic carries join
//! announcements to users that are not yet subscribed to the chat.

use std::fmt;

const CHAT_PREFIX: &str = "chat:";
const CHAT_SUFFIX: &str = ":events";

/// Reserved topic for cross-chat join broadcasts
pub const BROADCAST_TOPIC: &str = "chat:broadcast:join";

/// A named pub/sub channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    /// Topic of a chat: `chat:<chat_id>:events`.
    pub fn chat(chat_id: i64) -> Self {
        Self(format!("{}{}{}", CHAT_PREFIX, chat_id, CHAT_SUFFIX))
    }

    /// The join broadcast topic.
    pub fn broadcast() -> Self {
        Self(BROADCAST_TOPIC.to_string())
    }

    /// Rebuild a topic from a channel name received off the wire.
    pub fn from_name(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == BROADCAST_TOPIC
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
