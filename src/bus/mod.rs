//! Cross-instance distribution over a shared publish/subscribe transport.
//!
//! [`DistributionBus`] is deliberately narrow: [`publish`](DistributionBus::publish)
//! and [`subscribe`](DistributionBus::subscribe) on one fixed [`Topic`].
//! Every instance publishes what its clients send and relays everything it
//! receives, including its own publications, so local and remote messages
//! take the same path.
//!
//! Delivery is inherited from the transport: at-most-once, best-effort,
//! ordered only per publisher, no replay for instances that were not
//! subscribed at publish time.

pub mod memory;
pub mod redis_bus;

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::domain::Message;

pub use memory::{InMemoryBroker, InMemoryBus};
pub use redis_bus::RedisBus;

/// Default channel name shared by every gateway instance.
pub const DEFAULT_TOPIC: &str = "broadcast-channel";

/// Unbounded stream of messages received on the topic.
///
/// Ends only when the transport connection is lost or shut down.
pub type MessageStream = BoxStream<'static, Message>;

/// Name of the pub/sub channel the gateway fans out on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
    /// Creates a topic from a channel name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the channel name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Topic {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport-level failure of the distribution bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Error reported by the Redis client.
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// The transport is not reachable.
    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

/// Publish/subscribe abstraction over the shared transport.
///
/// Implementations must deliver a publication back to the publisher's own
/// subscription as well as to every other subscriber.
#[async_trait]
pub trait DistributionBus: Send + Sync + fmt::Debug {
    /// Sends `message` to the topic, fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] only on a local transport failure; success does
    /// not mean any subscriber received the message.
    async fn publish(&self, message: Message) -> Result<(), BusError>;

    /// Opens a new subscription on the topic.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the subscription cannot be established.
    async fn subscribe(&self) -> Result<MessageStream, BusError>;

    /// The topic this bus publishes and subscribes on.
    fn topic(&self) -> &Topic;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_topic_name() {
        assert_eq!(Topic::default().as_str(), "broadcast-channel");
        assert_eq!(Topic::new("room").to_string(), "room");
    }

    #[test]
    fn unavailable_error_display() {
        let err = BusError::Unavailable("link down".to_string());
        assert_eq!(err.to_string(), "bus unavailable: link down");
    }
}
