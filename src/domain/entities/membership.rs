//! Chat membership entity and oracle trait.
//!
//! Maps to the `chat_members` table. Rows are written by the chat management
//! layer; this crate only reads them and reacts to lifecycle messages.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Membership status matching the `chat_members.status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Active member
    InChat,
    /// Left on their own
    Left,
    /// Removed by another member
    Kicked,
}

impl MembershipStatus {
    /// Convert from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_chat" => Some(Self::InChat),
            "left" => Some(Self::Left),
            "kicked" => Some(Self::Kicked),
            _ => None,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InChat => "in_chat",
            Self::Left => "left",
            Self::Kicked => "kicked",
        }
    }
}

/// Represents a user's membership in a chat.
///
/// Maps to the `chat_members` table:
/// - user_id: BIGINT NOT NULL (composite PK)
/// - chat_id: BIGINT NOT NULL (composite PK)
/// - status: TEXT NOT NULL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMembership {
    pub user_id: i64,
    pub chat_id: i64,
    pub status: MembershipStatus,
}

impl ChatMembership {
    /// Check if the membership is currently active.
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::InChat
    }
}

/// Read-only authority on chat membership.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    /// Is `user_id` currently an active member of `chat_id`?
    ///
    /// A missing chat or membership row answers `false`.
    async fn is_active_member(&self, user_id: i64, chat_id: i64) -> Result<bool, AppError>;

    /// Chats where `user_id` is an active member.
    async fn active_chats_of(&self, user_id: i64) -> Result<HashSet<i64>, AppError>;

    /// Drop any cached answer for `(user_id, chat_id)` after a status change.
    async fn invalidate(&self, _user_id: i64, _chat_id: i64) -> Result<(), AppError> {
        Ok(())
    }
}
