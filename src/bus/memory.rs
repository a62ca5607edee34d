//! In-process implementation of [`DistributionBus`].
//!
//! [`InMemoryBroker`] plays the role of the shared transport: it wraps a
//! [`tokio::sync::broadcast`] channel. Each gateway instance gets its own
//! [`InMemoryBus`] handle from [`InMemoryBroker::connect`]. Used for
//! single-process deployments (`BUS_BACKEND=memory`) and as a deterministic
//! fake in tests, where a handle can be severed or marked unavailable to
//! simulate losing the transport on one instance.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

use super::{BusError, DistributionBus, MessageStream, Topic};
use crate::domain::Message;

/// Shared in-process transport for one topic.
///
/// Cloning is cheap; all clones share the same channel. A subscriber that
/// falls more than `capacity` messages behind skips the oldest ones.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    sender: broadcast::Sender<Message>,
    topic: Topic,
}

impl InMemoryBroker {
    /// Creates a broker for `topic` with the given channel capacity.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(topic: Topic, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, topic }
    }

    /// Returns a new bus handle attached to this broker.
    #[must_use]
    pub fn connect(&self) -> InMemoryBus {
        let (link, _) = watch::channel(0);
        InMemoryBus {
            broker: self.clone(),
            link,
            available: AtomicBool::new(true),
        }
    }

    /// Number of live subscriptions across all handles.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// One instance's connection to an [`InMemoryBroker`].
#[derive(Debug)]
pub struct InMemoryBus {
    broker: InMemoryBroker,
    /// Bumped by [`InMemoryBus::sever`]; every live stream of this handle
    /// ends when it changes.
    link: watch::Sender<u64>,
    available: AtomicBool,
}

impl InMemoryBus {
    /// Ends every subscription opened through this handle, as if the
    /// transport connection had dropped. Later subscriptions are unaffected.
    pub fn sever(&self) {
        self.link.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
        tracing::debug!(topic = %self.broker.topic, "in-memory bus link severed");
    }

    /// Marks the transport reachable or unreachable for this handle.
    /// While unavailable, `publish` and `subscribe` fail.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), BusError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BusError::Unavailable(format!(
                "in-memory link to {} is down",
                self.broker.topic
            )))
        }
    }
}

#[async_trait]
impl DistributionBus for InMemoryBus {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        self.ensure_available()?;
        // No subscribers means nobody to deliver to, which is not an error.
        let receivers = self.broker.sender.send(message).unwrap_or(0);
        tracing::trace!(topic = %self.broker.topic, receivers, "published");
        Ok(())
    }

    async fn subscribe(&self) -> Result<MessageStream, BusError> {
        self.ensure_available()?;
        let rx = self.broker.sender.subscribe();
        let link = self.link.subscribe();

        let stream = futures_util::stream::unfold((rx, link), |(mut rx, mut link)| async move {
            loop {
                tokio::select! {
                    biased;
                    _ = link.changed() => return None,
                    received = rx.recv() => match received {
                        Ok(message) => return Some((message, (rx, link))),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                skipped,
                                "in-memory subscriber lagged; messages dropped"
                            );
                        }
                        Err(RecvError::Closed) => return None,
                    },
                }
            }
        });
        Ok(stream.boxed())
    }

    fn topic(&self) -> &Topic {
        &self.broker.topic
    }
}
