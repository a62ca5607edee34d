//! Subscription supervisor: relays bus traffic into the local registry.
//!
//! [`Supervisor::run`] owns this instance's single subscription for the
//! lifetime of the process. Messages are broadcast one at a time in bus
//! order. Losing the subscription leaves the instance partitioned from its
//! peers, so the supervisor resubscribes with exponential backoff and, if
//! a retry limit is configured and exhausted, returns
//! [`GatewayError::SubscriptionLost`] for the process to exit on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;

use crate::bus::DistributionBus;
use crate::domain::ConnectionRegistry;
use crate::error::GatewayError;

/// Lower bound for any resubscription delay.
pub const MIN_BACKOFF: Duration = Duration::from_millis(1);

/// Exponential resubscription backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
    /// Consecutive failures tolerated before giving up; `0` retries forever.
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1-based): `initial * 2^(attempt-1)`,
    /// capped at `max`. Never shorter than [`MIN_BACKOFF`].
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let initial = self.initial.max(MIN_BACKOFF);
        let max = self.max.max(MIN_BACKOFF);
        initial.checked_mul(1_u32 << exponent).unwrap_or(max).min(max)
    }

    /// Returns `true` once `failures` consecutive failures exhaust the policy.
    #[must_use]
    pub const fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts != 0 && failures >= self.max_attempts
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(30),
            max_attempts: 0,
        }
    }
}

/// Lock-free view of the subscription, shared with the health endpoint.
#[derive(Debug, Default)]
pub struct SubscriptionStatus {
    subscribed: AtomicBool,
    messages_relayed: AtomicU64,
    subscriptions: AtomicU64,
    consecutive_failures: AtomicU32,
}

impl SubscriptionStatus {
    /// Creates a status in the not-yet-subscribed state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a subscription stream is live.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    /// Total messages relayed from the bus into the registry.
    #[must_use]
    pub fn messages_relayed(&self) -> u64 {
        self.messages_relayed.load(Ordering::Relaxed)
    }

    /// Number of subscriptions successfully established, including the first.
    #[must_use]
    pub fn subscriptions(&self) -> u64 {
        self.subscriptions.load(Ordering::Relaxed)
    }

    /// Failures since the last successful subscribe.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    fn mark_subscribed(&self) {
        self.subscriptions.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.subscribed.store(true, Ordering::SeqCst);
    }

    /// Returns the new consecutive failure count.
    fn mark_failed(&self) -> u32 {
        self.subscribed.store(false, Ordering::SeqCst);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record_relay(&self) {
        self.messages_relayed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Runs the subscription loop for one gateway instance.
#[derive(Debug)]
pub struct Supervisor {
    bus: Arc<dyn DistributionBus>,
    registry: Arc<ConnectionRegistry>,
    status: Arc<SubscriptionStatus>,
    backoff: BackoffPolicy,
}

impl Supervisor {
    /// Creates a supervisor wiring `bus` into `registry`.
    #[must_use]
    pub fn new(
        bus: Arc<dyn DistributionBus>,
        registry: Arc<ConnectionRegistry>,
        status: Arc<SubscriptionStatus>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            bus,
            registry,
            status,
            backoff,
        }
    }

    /// Subscribes and relays messages until the retry policy is exhausted.
    ///
    /// Client connections are never closed here; while resubscribing they
    /// simply receive no cross-instance traffic.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SubscriptionLost`] once
    /// [`BackoffPolicy::max_attempts`] consecutive subscribe attempts have
    /// failed. With `max_attempts == 0` this never returns.
    pub async fn run(self) -> Result<(), GatewayError> {
        let topic = self.bus.topic().clone();

        loop {
            match self.bus.subscribe().await {
                Ok(mut stream) => {
                    self.status.mark_subscribed();
                    tracing::info!(topic = %topic, "subscription established");

                    while let Some(message) = stream.next().await {
                        let report = self.registry.broadcast(&message);
                        self.status.record_relay();
                        if !report.evicted.is_empty() {
                            tracing::debug!(
                                delivered = report.delivered,
                                evicted = report.evicted.len(),
                                "broadcast evicted connections"
                            );
                        }
                    }

                    tracing::error!(
                        topic = %topic,
                        "subscription stream ended; instance partitioned"
                    );
                }
                Err(err) => {
                    tracing::error!(topic = %topic, error = %err, "subscribe failed");
                }
            }

            let failures = self.status.mark_failed();
            if self.backoff.exhausted(failures) {
                tracing::error!(topic = %topic, attempts = failures, "giving up on subscription");
                return Err(GatewayError::SubscriptionLost { attempts: failures });
            }

            let delay = self.backoff.delay(failures);
            tracing::warn!(
                topic = %topic,
                attempt = failures,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "resubscribing after backoff"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
