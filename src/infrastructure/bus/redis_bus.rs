//! Redis pub/sub binding.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use redis::aio::{ConnectionManager, PubSubSink};
use redis::{AsyncCommands, Client};
use tracing::{debug, instrument, warn};

use super::{decode_message, encode_message, initial_topics};
use crate::domain::{Message, MessageBus, Subscription, Topic};
use crate::shared::error::BusError;

/// Message bus over Redis `PUBLISH`/`SUBSCRIBE`.
///
/// Publishing multiplexes over one shared connection. Redis puts a
/// subscribed connection into a dedicated mode, so every subscription opens
/// its own pub/sub connection from the client.
#[derive(Clone)]
pub struct RedisMessageBus {
    client: Client,
    publisher: ConnectionManager,
}

impl RedisMessageBus {
    pub fn new(client: Client, publisher: ConnectionManager) -> Self {
        Self { client, publisher }
    }
}

#[async_trait]
impl MessageBus for RedisMessageBus {
    #[instrument(
        skip(self, message),
        fields(topic = %topic, message_id = message.id),
        level = "debug",
    )]
    async fn publish(&self, topic: &Topic, message: &Message) -> Result<(), BusError> {
        let payload = encode_message(message)?;
        let mut conn = self.publisher.clone();

        let receivers: i64 = conn.publish(topic.as_str(), payload).await?;
        debug!(receivers = receivers, "Message published");

        Ok(())
    }

    #[instrument(skip(self, topics), fields(count = topics.len()), level = "debug")]
    async fn subscribe(&self, topics: Vec<Topic>) -> Result<Box<dyn Subscription>, BusError> {
        let pubsub = self.client.get_async_pubsub().await?;
        let (sink, stream) = pubsub.split();

        let mut subscription = RedisSubscription {
            sink,
            stream: stream.boxed(),
            topics: HashSet::new(),
            closed: false,
        };
        subscription.add_topics(&initial_topics(topics)).await?;

        Ok(Box::new(subscription))
    }
}

impl std::fmt::Debug for RedisMessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisMessageBus").finish_non_exhaustive()
    }
}

/// One session's Redis pub/sub connection and its topic set.
pub struct RedisSubscription {
    sink: PubSubSink,
    stream: BoxStream<'static, redis::Msg>,
    topics: HashSet<Topic>,
    closed: bool,
}

impl RedisSubscription {
    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed {
            return Err(BusError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn add_topics(&mut self, topics: &[Topic]) -> Result<(), BusError> {
        self.ensure_open()?;
        for topic in topics {
            if self.topics.contains(topic) {
                continue;
            }
            self.sink.subscribe(topic.as_str()).await?;
            self.topics.insert(topic.clone());
            debug!(topic = %topic, "Subscribed");
        }
        Ok(())
    }

    async fn remove_topics(&mut self, topics: &[Topic]) -> Result<(), BusError> {
        self.ensure_open()?;
        for topic in topics {
            if !self.topics.contains(topic) {
                continue;
            }
            self.sink.unsubscribe(topic.as_str()).await?;
            self.topics.remove(topic);
            debug!(topic = %topic, "Unsubscribed");
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Message, BusError>> {
        if self.closed {
            return None;
        }
        loop {
            let msg = self.stream.next().await?;
            // In-flight deliveries can still arrive for a topic just removed.
            if !self.topics.contains(&Topic::from_name(msg.get_channel_name())) {
                continue;
            }
            return Some(decode_message(msg.get_payload_bytes()));
        }
    }

    async fn close(&mut self) -> Result<(), BusError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let topics: Vec<Topic> = self.topics.drain().collect();
        for topic in &topics {
            if let Err(e) = self.sink.unsubscribe(topic.as_str()).await {
                // Dropping the connection releases the remaining channels.
                warn!(topic = %topic, error = %e, "Unsubscribe on close failed");
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.topics.iter().cloned().collect();
        topics.sort();
        topics
    }
}
