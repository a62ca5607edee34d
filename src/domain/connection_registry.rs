//! Concurrent set of the connections held by this instance.
//!
//! [`ConnectionRegistry`] stores every live [`Connection`] in a `HashMap`
//! behind a single [`std::sync::RwLock`]. The lock is only ever held for
//! map mutation and for the snapshot step of a broadcast, never across an
//! `.await` or a socket write.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::connection::DeliveryError;
use super::{Connection, ConnectionId, Message};

/// Outcome of a single [`ConnectionRegistry::broadcast`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the message was queued to.
    pub delivered: usize,
    /// Connections that failed and were removed.
    pub evicted: Vec<ConnectionId>,
}

impl BroadcastReport {
    /// Number of connections in the snapshot.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.delivered + self.evicted.len()
    }
}

/// Thread-safe set of active connections.
///
/// # Concurrency
///
/// - [`add`](Self::add) and [`remove`](Self::remove) take the write lock.
/// - [`broadcast`](Self::broadcast) takes the read lock just long enough to
///   clone the current handles, then delivers outside the lock. Connections
///   added after the snapshot miss that message; connections removed after
///   it may still be handed the message, which their closed queue rejects.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection as a broadcast target.
    pub fn add(&self, conn: Connection) {
        let id = conn.id();
        let mut map = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if map.insert(id, Arc::new(conn)).is_some() {
            tracing::warn!(connection = %id, "connection registered twice; replacing handle");
        }
    }

    /// Registers a connection and returns a guard that removes it on drop.
    #[must_use = "dropping the guard deregisters the connection immediately"]
    pub fn register(self: &Arc<Self>, conn: Connection) -> RegistrationGuard {
        let id = conn.id();
        self.add(conn);
        RegistrationGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Deregisters a connection and closes it.
    ///
    /// Idempotent: removing an absent connection is a no-op. Returns `true`
    /// if the connection was present.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let removed = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match removed {
            Some(conn) => {
                conn.close();
                tracing::debug!(connection = %id, "connection removed");
                true
            }
            None => false,
        }
    }

    /// Queues `message` to every connection present when the call starts.
    ///
    /// A failing connection is logged and removed after the pass; it never
    /// stops delivery to the others.
    pub fn broadcast(&self, message: &Message) -> BroadcastReport {
        let snapshot = self.snapshot();
        let mut report = BroadcastReport::default();

        for conn in &snapshot {
            match conn.try_deliver(message) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    match err {
                        DeliveryError::Stalled => tracing::warn!(
                            connection = %conn.id(),
                            error = %err,
                            "evicting slow connection"
                        ),
                        DeliveryError::Closed => tracing::debug!(
                            connection = %conn.id(),
                            error = %err,
                            "dropping closed connection"
                        ),
                    }
                    report.evicted.push(conn.id());
                }
            }
        }

        for id in &report.evicted {
            self.remove(*id);
        }

        tracing::trace!(
            delivered = report.delivered,
            evicted = report.evicted.len(),
            bytes = message.len(),
            "broadcast complete"
        );
        report
    }

    /// Returns `true` if the connection is currently registered.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no connection is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

/// Scoped registration: removes (and closes) the connection when dropped,
/// on every exit path of the owning task.
#[derive(Debug)]
pub struct RegistrationGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl RegistrationGuard {
    /// Identity of the guarded connection.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
