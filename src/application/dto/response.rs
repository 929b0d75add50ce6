//! Response DTOs
//!
//! Data structures for API response bodies. Snowflake ids are rendered as
//! strings so JavaScript clients keep full precision.

use serde::{Deserialize, Serialize};

use crate::domain::{HistorySource, Message, MessageAction, Page};

/// Message response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub action: MessageAction,
    pub text: String,
    pub chat_id: String,
    pub sender_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub created_at: String,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id.to_string(),
            action: message.action,
            text: message.text,
            chat_id: message.chat_id.to_string(),
            sender_id: message.sender_id.to_string(),
            target_id: message.target_id.map(|id| id.to_string()),
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

/// One page of chat history
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<MessageResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    pub has_more: bool,
    pub source: HistorySource,
}

impl From<Page<Message>> for HistoryResponse {
    fn from(page: Page<Message>) -> Self {
        let page = page.map(MessageResponse::from);
        Self {
            messages: page.items,
            total: page.total,
            has_more: page.has_more,
            source: page.source,
        }
    }
}
