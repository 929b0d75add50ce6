//! In-process message bus.
//!
//! Subscribers live in a shared registry keyed by subscription id. Publishing
//! walks the registry and pushes the encoded payload to every subscriber of
//! the topic, so delivery goes through the same codec as the Redis binding.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{decode_message, encode_message, initial_topics};
use crate::domain::{Message, MessageBus, Subscription, Topic};
use crate::shared::error::BusError;

#[derive(Debug)]
struct Delivery {
    topic: Topic,
    payload: Vec<u8>,
}

#[derive(Debug)]
struct Subscriber {
    topics: HashSet<Topic>,
    sender: mpsc::UnboundedSender<Delivery>,
}

#[derive(Debug, Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: DashMap<u64, Subscriber>,
}

/// Single-process pub/sub over tokio channels.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageBus {
    registry: Arc<Registry>,
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers.len()
    }

    /// Drop every subscriber. Their `recv` returns `None` once drained.
    pub fn disconnect_all(&self) {
        self.registry.subscribers.clear();
    }

    fn deliver(&self, topic: &Topic, payload: Vec<u8>) -> usize {
        let mut delivered = 0;
        for entry in self.registry.subscribers.iter() {
            if !entry.topics.contains(topic) {
                continue;
            }
            let delivery = Delivery {
                topic: topic.clone(),
                payload: payload.clone(),
            };
            // A closed receiver is cleaned up by its own Drop.
            if entry.sender.send(delivery).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Push raw bytes, bypassing the encoder.
    pub fn publish_raw(&self, topic: &Topic, payload: &[u8]) -> usize {
        self.deliver(topic, payload.to_vec())
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, topic: &Topic, message: &Message) -> Result<(), BusError> {
        let payload = encode_message(message)?;
        let receivers = self.deliver(topic, payload);
        trace!(topic = %topic, receivers = receivers, "Message published");
        Ok(())
    }

    async fn subscribe(&self, topics: Vec<Topic>) -> Result<Box<dyn Subscription>, BusError> {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let topics: HashSet<Topic> = initial_topics(topics).into_iter().collect();
        let (sender, receiver) = mpsc::unbounded_channel();

        self.registry.subscribers.insert(
            id,
            Subscriber {
                topics: topics.clone(),
                sender,
            },
        );
        debug!(subscription_id = id, "Subscription opened");

        Ok(Box::new(MemorySubscription {
            id,
            registry: Arc::clone(&self.registry),
            receiver,
            topics,
            closed: false,
        }))
    }
}

/// Subscription handle of [`InMemoryMessageBus`].
#[derive(Debug)]
pub struct MemorySubscription {
    id: u64,
    registry: Arc<Registry>,
    receiver: mpsc::UnboundedReceiver<Delivery>,
    topics: HashSet<Topic>,
    closed: bool,
}

impl MemorySubscription {
    fn update_registry<F>(&self, update: F) -> Result<(), BusError>
    where
        F: FnOnce(&mut HashSet<Topic>),
    {
        if self.closed {
            return Err(BusError::Closed);
        }
        let mut entry = self
            .registry
            .subscribers
            .get_mut(&self.id)
            .ok_or(BusError::Closed)?;
        update(&mut entry.topics);
        Ok(())
    }
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn add_topics(&mut self, topics: &[Topic]) -> Result<(), BusError> {
        self.update_registry(|registered| registered.extend(topics.iter().cloned()))?;
        self.topics.extend(topics.iter().cloned());
        Ok(())
    }

    async fn remove_topics(&mut self, topics: &[Topic]) -> Result<(), BusError> {
        self.update_registry(|registered| {
            for topic in topics {
                registered.remove(topic);
            }
        })?;
        for topic in topics {
            self.topics.remove(topic);
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Message, BusError>> {
        if self.closed {
            return None;
        }
        loop {
            let delivery = self.receiver.recv().await?;
            // Queued before the topic was removed.
            if !self.topics.contains(&delivery.topic) {
                continue;
            }
            return Some(decode_message(&delivery.payload));
        }
    }

    async fn close(&mut self) -> Result<(), BusError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.registry.subscribers.remove(&self.id);
        self.receiver.close();
        debug!(subscription_id = self.id, "Subscription closed");
        Ok(())
    }

    fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.topics.iter().cloned().collect();
        topics.sort();
        topics
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.registry.subscribers.remove(&self.id);
    }
}
