//! Serving Session
//!
//! One session per live connection. It owns the subscription handle, the
//! inbound receiver of send requests and the outbound sender of messages,
//! and multiplexes them in a single task:
//!
//! ```text
//!   inbound  ──► create ──► history + bus
//!   bus      ──► dispatch ──► outbound
//! ```
//!
//! The session ends as soon as any one of its endpoints goes away. The
//! handle is closed before the outbound sender is dropped, so a reader that
//! sees end-of-stream can rely on the subscription being gone.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::message_service::{CreateMessageDto, MessageError, MessageService};
use crate::domain::{MembershipOracle, Message, MessageAction, Subscription, Topic};
use crate::infrastructure::metrics::SessionGauge;
use crate::shared::error::{AppError, BusError};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Closing,
    Closed,
}

/// Why a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The connection dropped its inbound sender
    ClientClosed,
    /// The bus stream ended
    BusClosed,
    /// Nobody reads the outbound channel anymore
    OutboundClosed,
}

/// Failures that terminate a session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Subscription failed: {0}")]
    Bus(#[from] BusError),

    #[error("Send failed: {0}")]
    Service(#[from] MessageError),

    #[error("Membership lookup failed: {0}")]
    Membership(#[from] AppError),
}

/// What to do with a message that arrived on the bus.
enum Dispatch {
    Forward(Message),
    Discard,
}

pub struct ServingSession {
    id: Uuid,
    user_id: i64,
    state: SessionState,
    service: Arc<dyn MessageService>,
    oracle: Arc<dyn MembershipOracle>,
    subscription: Box<dyn Subscription>,
    inbound: mpsc::Receiver<CreateMessageDto>,
    outbound: mpsc::Sender<Message>,
}

impl ServingSession {
    pub fn new(
        user_id: i64,
        service: Arc<dyn MessageService>,
        oracle: Arc<dyn MembershipOracle>,
        subscription: Box<dyn Subscription>,
        inbound: mpsc::Receiver<CreateMessageDto>,
        outbound: mpsc::Sender<Message>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            state: SessionState::Active,
            service,
            oracle,
            subscription,
            inbound,
            outbound,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serve until one of the endpoints goes away.
    pub async fn run(mut self) -> Result<SessionEnd, SessionError> {
        let _gauge = SessionGauge::acquire();
        info!(
            session_id = %self.id,
            user_id = self.user_id,
            topics = self.subscription.topics().len(),
            "Session started"
        );

        let result = self.event_loop().await;
        self.shutdown().await;

        match &result {
            Ok(end) => info!(
                session_id = %self.id,
                user_id = self.user_id,
                end = ?end,
                "Session closed"
            ),
            Err(e) => warn!(
                session_id = %self.id,
                user_id = self.user_id,
                error = %e,
                "Session failed"
            ),
        }
        result
    }

    async fn event_loop(&mut self) -> Result<SessionEnd, SessionError> {
        loop {
            tokio::select! {
                request = self.inbound.recv() => match request {
                    Some(request) => self.handle_request(request).await?,
                    None => return Ok(SessionEnd::ClientClosed),
                },
                delivery = self.subscription.recv() => match delivery {
                    Some(Ok(message)) => {
                        if let Dispatch::Forward(message) = self.dispatch(message).await? {
                            if self.outbound.send(message).await.is_err() {
                                return Ok(SessionEnd::OutboundClosed);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(
                            session_id = %self.id,
                            error = %e,
                            "Dropping undecodable bus message"
                        );
                    }
                    None => return Ok(SessionEnd::BusClosed),
                },
                _ = self.outbound.closed() => return Ok(SessionEnd::OutboundClosed),
            }
        }
    }

    async fn handle_request(&mut self, request: CreateMessageDto) -> Result<(), SessionError> {
        let chat_id = request.chat_id;
        match self.service.create(self.user_id, request).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_recoverable() => {
                debug!(session_id = %self.id, chat_id, error = %e, "Send request rejected");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn dispatch(&mut self, message: Message) -> Result<Dispatch, SessionError> {
        let chat = Topic::chat(message.chat_id);
        let affects_self = message.affected_user() == self.user_id;

        match message.action {
            MessageAction::Send => {
                if message.sender_id == self.user_id {
                    return Ok(Dispatch::Discard);
                }
            }
            MessageAction::Join => {
                // Joins arrive on the broadcast topic; only members may see them.
                if !self
                    .oracle
                    .is_active_member(self.user_id, message.chat_id)
                    .await?
                {
                    return Ok(Dispatch::Discard);
                }
                if affects_self {
                    self.subscription.add_topics(&[chat]).await?;
                    debug!(session_id = %self.id, chat_id = message.chat_id, "Joined chat topic");
                }
            }
            MessageAction::Leave | MessageAction::Kick => {
                if affects_self {
                    self.subscription.remove_topics(&[chat]).await?;
                    debug!(session_id = %self.id, chat_id = message.chat_id, "Left chat topic");
                }
            }
            MessageAction::Block => {}
            MessageAction::Unknown => {
                warn!(
                    session_id = %self.id,
                    message_id = message.id,
                    "Discarding message with unknown action"
                );
                return Ok(Dispatch::Discard);
            }
        }
        Ok(Dispatch::Forward(message))
    }

    /// Release the subscription and drain pending requests. Runs once.
    async fn shutdown(&mut self) {
        if self.state != SessionState::Active {
            return;
        }
        self.state = SessionState::Closing;
        if let Err(e) = self.subscription.close().await {
            warn!(session_id = %self.id, error = %e, "Failed to close subscription");
        }
        self.inbound.close();
        let mut discarded = 0usize;
        while self.inbound.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(session_id = %self.id, discarded, "Discarded pending send requests");
        }
        self.state = SessionState::Closed;
    }
}
