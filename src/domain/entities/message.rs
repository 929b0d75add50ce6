//! Message entity and history store trait.
//!
//! Maps to the `messages` table in the database schema and to the
//! `chat:<chat_id>:messages` sorted set in the cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Page, PageParams};
use crate::shared::error::AppError;

/// What a message means to the chat it belongs to.
///
/// `Send` is ordinary content; the rest are lifecycle notifications generated
/// by the server when membership changes.
///
/// Database definition:
/// ```sql
/// action TEXT NOT NULL CHECK (action IN ('send', 'join', 'leave', 'kick', 'block'))
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageAction {
    /// Regular chat content
    Send,
    /// A user became an active member
    Join,
    /// A user left on their own
    Leave,
    /// A user was removed by another member
    Kick,
    /// Moderation signal, no subscription effect
    Block,
    /// Any action this build does not know about
    #[serde(other)]
    Unknown,
}

impl MessageAction {
    /// Convert from database string representation.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "send" => Self::Send,
            "join" => Self::Join,
            "leave" => Self::Leave,
            "kick" => Self::Kick,
            "block" => Self::Block,
            _ => Self::Unknown,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Kick => "kick",
            Self::Block => "block",
            Self::Unknown => "unknown",
        }
    }

    /// Check if this is a membership lifecycle action.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Join | Self::Leave | Self::Kick | Self::Block)
    }
}

impl std::fmt::Display for MessageAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents a message in a chat. Immutable once created.
///
/// Maps to the `messages` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - chat_id: BIGINT NOT NULL
/// - sender_id: BIGINT NOT NULL
/// - target_id: BIGINT NULL -- Affected user of a kick/block
/// - action: TEXT NOT NULL
/// - text: TEXT NOT NULL (empty only for lifecycle messages)
/// - created_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// What kind of message this is
    pub action: MessageAction,

    /// Message content
    #[serde(default)]
    pub text: String,

    /// Chat the message belongs to
    pub chat_id: i64,

    /// Acting user: who sent, joined, left, or performed a kick
    pub sender_id: i64,

    /// User affected by a kick or block, when different from the actor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<i64>,

    /// Server-assigned creation time
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The user whose membership this message is about.
    ///
    /// Kick and Block carry the acting user in `sender_id` and the affected
    /// user in `target_id`. Join and Leave have no target; the sender is the
    /// member who joined or left.
    pub fn affected_user(&self) -> i64 {
        self.target_id.unwrap_or(self.sender_id)
    }

    /// Check if this is a lifecycle message.
    pub fn is_lifecycle(&self) -> bool {
        self.action.is_lifecycle()
    }

    /// Get the text length in characters.
    pub fn text_length(&self) -> usize {
        self.text.chars().count()
    }
}

/// Message history storage.
///
/// Implemented by the cache-backed fast tier, the relational durable tier,
/// and the composite that reads them in order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Store a message.
    async fn append(&self, message: &Message) -> Result<(), AppError>;

    /// Read one page of a chat's history. Items come back in ascending
    /// creation order whatever the page direction.
    async fn list(&self, chat_id: i64, params: &PageParams) -> Result<Page<Message>, AppError>;
}
