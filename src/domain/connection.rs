//! Registry-side handle for a single client connection.
//!
//! Opening a connection produces two halves:
//!
//! - [`Connection`] goes into the [`super::ConnectionRegistry`]. Broadcasts
//!   push messages into its bounded outbound queue without touching the
//!   socket.
//! - [`ConnectionEndpoint`] stays with the WebSocket tasks. The write loop
//!   drains the queue into the socket; both loops watch the shared
//!   [`CloseSignal`].
//!
//! Socket writes therefore never happen under the registry lock, and a
//! stalled peer only ever fills its own queue.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use super::{ConnectionId, Message};

/// Lifecycle of a client connection as seen by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Upgrade handshake in progress.
    Connecting,
    /// Registered and reading client frames.
    Active,
    /// Read loop ended; deregistration and socket close in progress.
    Closing,
    /// Removed from the registry and socket released.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Why a message could not be handed to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The outbound queue is full: the peer is not keeping up.
    #[error("outbound queue full; peer stalled")]
    Stalled,
    /// The connection was closed or its write loop has exited.
    #[error("connection closed")]
    Closed,
}

/// One-shot, cloneable close flag shared by both halves of a connection.
#[derive(Debug, Clone)]
pub struct CloseSignal(Arc<watch::Sender<bool>>);

impl CloseSignal {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self(Arc::new(tx))
    }

    /// Fires the signal. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        !self.0.send_replace(true)
    }

    /// Returns `true` once the signal has fired.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the signal has fired. Returns immediately if it
    /// already has.
    pub async fn closed(&self) {
        let mut rx = self.0.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

/// Registry-owned handle to a live client connection.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    outbound: mpsc::Sender<Message>,
    close: CloseSignal,
}

/// Transport-side half of a connection, owned by the WebSocket tasks.
#[derive(Debug)]
pub struct ConnectionEndpoint {
    /// Identity shared with the matching [`Connection`].
    pub id: ConnectionId,
    /// Messages queued by broadcasts, in broadcast order.
    pub outbound: mpsc::Receiver<Message>,
    /// Fired when the connection is removed or its socket fails.
    pub close: CloseSignal,
}

impl Connection {
    /// Opens a connection with an outbound queue of `capacity` messages.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn open(capacity: usize) -> (Self, ConnectionEndpoint) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let close = CloseSignal::new();
        let conn = Self {
            id,
            outbound: tx,
            close: close.clone(),
        };
        let endpoint = ConnectionEndpoint {
            id,
            outbound: rx,
            close,
        };
        (conn, endpoint)
    }

    /// Returns the connection identity.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues `message` for the write loop without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Stalled`] when the queue is full and
    /// [`DeliveryError::Closed`] when the connection is closed.
    pub fn try_deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        if self.close.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.outbound
            .try_send(message.clone())
            .map_err(|e| match e {
                TrySendError::Full(_) => DeliveryError::Stalled,
                TrySendError::Closed(_) => DeliveryError::Closed,
            })
    }

    /// Closes the connection: the write loop sends a close frame and the
    /// socket is released. Returns `true` if this call closed it.
    pub fn close(&self) -> bool {
        self.close.close()
    }

    /// Returns `true` once the connection has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.close.is_closed()
    }
}
