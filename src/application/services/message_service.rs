//! Message Service
//!
//! Creates messages, announces membership changes, reads history and opens
//! serving sessions. Every write goes to the history store before the bus.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::serving_session::{ServingSession, SessionEnd, SessionError};
use crate::domain::{
    HistoryStore, MembershipOracle, Message, MessageAction, MessageBus, Page, PageParams, Topic,
};
use crate::infrastructure::metrics;
use crate::shared::error::{AppError, BusError};
use crate::shared::snowflake::SnowflakeGenerator;

/// Longest accepted message text, in characters
pub const MAX_TEXT_LENGTH: usize = 4000;

/// Message service trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Send a message to a chat the sender is an active member of
    async fn create(&self, sender_id: i64, request: CreateMessageDto)
        -> Result<Message, MessageError>;

    /// Record and fan out a membership change committed elsewhere
    async fn announce(&self, event: LifecycleEvent) -> Result<Message, MessageError>;

    /// Read one page of a chat's history as `user_id`
    async fn list_history(
        &self,
        user_id: i64,
        chat_id: i64,
        params: PageParams,
    ) -> Result<Page<Message>, MessageError>;

    /// Start a serving session for `user_id`
    async fn open_session(&self, user_id: i64) -> Result<SessionChannels, MessageError>;
}

/// Create message request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMessageDto {
    pub chat_id: i64,
    pub text: String,
}

/// A membership status change to announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub action: MessageAction,
    pub chat_id: i64,
    /// Who acted: the joiner, the leaver, or the kicking member
    pub actor_id: i64,
    /// Who was affected, when not the actor
    pub target_id: Option<i64>,
}

impl LifecycleEvent {
    pub fn join(chat_id: i64, user_id: i64) -> Self {
        Self {
            action: MessageAction::Join,
            chat_id,
            actor_id: user_id,
            target_id: None,
        }
    }

    pub fn leave(chat_id: i64, user_id: i64) -> Self {
        Self {
            action: MessageAction::Leave,
            chat_id,
            actor_id: user_id,
            target_id: None,
        }
    }

    pub fn kick(chat_id: i64, actor_id: i64, target_id: i64) -> Self {
        Self {
            action: MessageAction::Kick,
            chat_id,
            actor_id,
            target_id: Some(target_id),
        }
    }

    pub fn block(chat_id: i64, actor_id: i64, target_id: i64) -> Self {
        Self {
            action: MessageAction::Block,
            chat_id,
            actor_id,
            target_id: Some(target_id),
        }
    }

    fn affected_user(&self) -> i64 {
        self.target_id.unwrap_or(self.actor_id)
    }

    /// Join goes out on the broadcast topic so users not yet subscribed to
    /// the chat see it; every other change stays on the chat topic.
    fn topic(&self) -> Topic {
        match self.action {
            MessageAction::Join => Topic::broadcast(),
            _ => Topic::chat(self.chat_id),
        }
    }
}

/// Connection-side endpoints of a running session.
#[derive(Debug)]
pub struct SessionChannels {
    pub session_id: Uuid,
    /// Send requests from the client; dropping it ends the session
    pub inbound: mpsc::Sender<CreateMessageDto>,
    /// Messages for the client; ends when the session ends
    pub outbound: mpsc::Receiver<Message>,
    pub task: JoinHandle<Result<SessionEnd, SessionError>>,
}

/// Message service errors
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// Not an active member, or the chat does not exist
    #[error("Not a member of this chat")]
    Forbidden,

    #[error("Invalid message: {0}")]
    Validation(String),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl MessageError {
    /// Whether a session can drop the request and keep serving.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Forbidden | Self::Validation(_))
    }
}

impl From<MessageError> for AppError {
    fn from(err: MessageError) -> Self {
        match err {
            MessageError::Forbidden => AppError::Forbidden("Not a member of this chat".into()),
            MessageError::Validation(msg) => AppError::Validation(msg),
            MessageError::Bus(e) => e.into(),
            MessageError::Store(e) => e,
        }
    }
}

/// MessageService implementation
#[derive(Clone)]
pub struct MessageServiceImpl {
    bus: Arc<dyn MessageBus>,
    history: Arc<dyn HistoryStore>,
    oracle: Arc<dyn MembershipOracle>,
    id_generator: Arc<SnowflakeGenerator>,
    session_buffer: usize,
    max_page_limit: u32,
}

impl MessageServiceImpl {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        history: Arc<dyn HistoryStore>,
        oracle: Arc<dyn MembershipOracle>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            bus,
            history,
            oracle,
            id_generator,
            session_buffer: 64,
            max_page_limit: 100,
        }
    }

    pub fn with_session_buffer(mut self, capacity: usize) -> Self {
        self.session_buffer = capacity.max(1);
        self
    }

    pub fn with_max_page_limit(mut self, limit: u32) -> Self {
        self.max_page_limit = limit.max(1);
        self
    }

    fn validate_text(text: &str) -> Result<(), MessageError> {
        if text.trim().is_empty() {
            return Err(MessageError::Validation("Message text cannot be empty".into()));
        }
        if text.chars().count() > MAX_TEXT_LENGTH {
            return Err(MessageError::Validation(format!(
                "Message text exceeds {} characters",
                MAX_TEXT_LENGTH
            )));
        }
        Ok(())
    }

    fn build(&self, action: MessageAction, chat_id: i64, sender_id: i64, text: String) -> Message {
        let id = self.id_generator.generate();
        Message {
            id,
            action,
            text,
            chat_id,
            sender_id,
            target_id: None,
            created_at: self.id_generator.timestamp_of(id),
        }
    }

    /// Append, then publish. A publish failure leaves the stored message in
    /// place; readers of history still see it.
    async fn record(&self, topic: &Topic, message: &Message) -> Result<(), MessageError> {
        self.history.append(message).await?;
        self.bus.publish(topic, message).await?;
        metrics::record_published(message.action.as_str());
        Ok(())
    }
}

#[async_trait]
impl MessageService for MessageServiceImpl {
    #[instrument(skip(self, request), fields(chat_id = request.chat_id))]
    async fn create(
        &self,
        sender_id: i64,
        request: CreateMessageDto,
    ) -> Result<Message, MessageError> {
        Self::validate_text(&request.text)?;

        if !self
            .oracle
            .is_active_member(sender_id, request.chat_id)
            .await?
        {
            return Err(MessageError::Forbidden);
        }

        let message = self.build(MessageAction::Send, request.chat_id, sender_id, request.text);
        self.record(&Topic::chat(message.chat_id), &message).await?;

        debug!(message_id = message.id, "Message sent");
        Ok(message)
    }

    #[instrument(skip(self), fields(action = %event.action, chat_id = event.chat_id))]
    async fn announce(&self, event: LifecycleEvent) -> Result<Message, MessageError> {
        if !event.action.is_lifecycle() {
            return Err(MessageError::Validation(format!(
                "{} is not a membership change",
                event.action
            )));
        }

        self.oracle
            .invalidate(event.affected_user(), event.chat_id)
            .await?;

        let mut message = self.build(event.action, event.chat_id, event.actor_id, String::new());
        message.target_id = event.target_id;
        self.record(&event.topic(), &message).await?;

        info!(
            message_id = message.id,
            affected_user = message.affected_user(),
            "Membership change announced"
        );
        Ok(message)
    }

    #[instrument(skip(self, params))]
    async fn list_history(
        &self,
        user_id: i64,
        chat_id: i64,
        params: PageParams,
    ) -> Result<Page<Message>, MessageError> {
        if !self.oracle.is_active_member(user_id, chat_id).await? {
            return Err(MessageError::Forbidden);
        }

        let params = params.clamped(self.max_page_limit);
        let page = self.history.list(chat_id, &params).await?;

        debug!(
            count = page.items.len(),
            source = page.source.as_str(),
            "History page served"
        );
        Ok(page)
    }

    #[instrument(skip(self))]
    async fn open_session(&self, user_id: i64) -> Result<SessionChannels, MessageError> {
        let mut chats: Vec<i64> = self
            .oracle
            .active_chats_of(user_id)
            .await?
            .into_iter()
            .collect();
        chats.sort_unstable();
        let topics = chats.into_iter().map(Topic::chat).collect();

        let subscription = self.bus.subscribe(topics).await?;

        let (inbound_tx, inbound_rx) = mpsc::channel(self.session_buffer);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.session_buffer);

        let session = ServingSession::new(
            user_id,
            Arc::new(self.clone()),
            Arc::clone(&self.oracle),
            subscription,
            inbound_rx,
            outbound_tx,
        );
        let session_id = session.id();
        let task = tokio::spawn(session.run());

        Ok(SessionChannels {
            session_id,
            inbound: inbound_tx,
            outbound: outbound_rx,
            task,
        })
    }
}
