//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::bus::DistributionBus;
use crate::domain::ConnectionRegistry;
use crate::service::SubscriptionStatus;

/// Per-connection tuning applied by the WebSocket handler.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Messages queued per connection before it is evicted as stalled.
    pub outbound_queue_capacity: usize,
    /// Upper bound on a single socket write.
    pub write_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 256,
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Identifies this process in logs and health output.
    pub instance_id: uuid::Uuid,
    /// Connections held by this instance.
    pub registry: Arc<ConnectionRegistry>,
    /// Shared pub/sub transport.
    pub bus: Arc<dyn DistributionBus>,
    /// Subscription state maintained by the supervisor.
    pub status: Arc<SubscriptionStatus>,
    /// Per-connection tuning.
    pub connection: ConnectionSettings,
}
