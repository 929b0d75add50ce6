//! Message bus contract.
//!
//! Topic-based publish/subscribe. Delivery is at-most-once and best-effort:
//! a subscriber that is not connected when a message is published misses it.
//! The history store is the durable record.

use async_trait::async_trait;

use crate::domain::entities::Message;
use crate::domain::value_objects::Topic;
use crate::shared::error::BusError;

/// Publish/subscribe transport shared by every session of a process.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Deliver `message` to all current subscribers of `topic`.
    async fn publish(&self, topic: &Topic, message: &Message) -> Result<(), BusError>;

    /// Open a subscription to `topics` plus the broadcast topic.
    async fn subscribe(&self, topics: Vec<Topic>) -> Result<Box<dyn Subscription>, BusError>;
}

/// A live, mutable set of topics with a receive stream.
///
/// Owned by exactly one session; never shared between tasks.
#[async_trait]
pub trait Subscription: Send {
    /// Start receiving `topics`. Already-subscribed topics are ignored.
    async fn add_topics(&mut self, topics: &[Topic]) -> Result<(), BusError>;

    /// Stop receiving `topics`. Unknown topics are ignored.
    async fn remove_topics(&mut self, topics: &[Topic]) -> Result<(), BusError>;

    /// Next decoded message.
    ///
    /// `None` means the transport is gone and the handle cannot recover.
    /// `Some(Err(_))` is a single bad payload; the stream stays usable.
    async fn recv(&mut self) -> Option<Result<Message, BusError>>;

    /// Release transport resources. Safe to call more than once.
    async fn close(&mut self) -> Result<(), BusError>;

    /// Topics currently subscribed, broadcast included.
    fn topics(&self) -> Vec<Topic>;
}
