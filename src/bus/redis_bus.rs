//! Redis pub/sub implementation of [`DistributionBus`].
//!
//! Publishing goes through a [`ConnectionManager`], which reconnects on its
//! own after a dropped connection. Each subscription opens a dedicated
//! pub/sub connection; when that connection drops, the message stream ends
//! and the [`crate::service::Supervisor`] resubscribes.

use std::fmt;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use super::{BusError, DistributionBus, MessageStream, Topic};
use crate::domain::Message;

/// Redis-backed distribution bus.
#[derive(Clone)]
pub struct RedisBus {
    client: Client,
    publisher: ConnectionManager,
    topic: Topic,
}

impl RedisBus {
    /// Connects to Redis at `redis_url` and prepares the publishing
    /// connection.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Redis`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str, topic: Topic) -> Result<Self, BusError> {
        let client = Client::open(redis_url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        tracing::info!(topic = %topic, "connected to redis");
        Ok(Self {
            client,
            publisher,
            topic,
        })
    }
}

impl fmt::Debug for RedisBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBus")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DistributionBus for RedisBus {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn.publish(self.topic.as_str(), message.as_bytes()).await?;
        tracing::trace!(topic = %self.topic, receivers, bytes = message.len(), "published");
        Ok(())
    }

    async fn subscribe(&self) -> Result<MessageStream, BusError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(self.topic.as_str()).await?;
        tracing::info!(topic = %self.topic, "subscribed to redis channel");

        let stream = pubsub
            .into_on_message()
            .map(|msg| Message::from(msg.get_payload_bytes().to_vec()));
        Ok(stream.boxed())
    }

    fn topic(&self) -> &Topic {
        &self.topic
    }
}
