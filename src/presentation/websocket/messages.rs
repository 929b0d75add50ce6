//! WebSocket Message Types
//!
//! JSON frames exchanged on the gateway, tagged by `type`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::dto::MessageResponse;
use crate::application::services::CreateMessageDto;
use crate::domain::Message;

/// Client to server frame
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Post a message to a chat
    Send { chat_id: String, text: String },
    /// Keepalive; answered with `pong`
    Ping,
}

/// Server to client frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once after the upgrade
    Hello { session_id: Uuid, user_id: String },
    /// A fanned-out message
    Message { message: MessageResponse },
    Pong,
}

impl ServerFrame {
    pub fn message(message: Message) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Frame that failed to turn into a send request
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid chat id: {0}")]
    InvalidChatId(String),
}

/// What the reader should do with one text frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    Send(CreateMessageDto),
    Ping,
}

/// Parse a client text frame.
pub fn parse_frame(text: &str) -> Result<Inbound, FrameError> {
    match serde_json::from_str::<ClientFrame>(text)? {
        ClientFrame::Send { chat_id, text } => {
            let chat_id = chat_id
                .parse::<i64>()
                .map_err(|_| FrameError::InvalidChatId(chat_id))?;
            Ok(Inbound::Send(CreateMessageDto { chat_id, text }))
        }
        ClientFrame::Ping => Ok(Inbound::Ping),
    }
}
