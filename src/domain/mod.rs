//! Domain layer: connection identity, payloads, and the connection registry.
//!
//! This module contains the per-instance model of the gateway: the opaque
//! [`Message`] payload, the [`Connection`] handle and its transport-side
//! [`ConnectionEndpoint`], and the [`ConnectionRegistry`] that fans a
//! message out to every local connection.

pub mod connection;
pub mod connection_id;
pub mod connection_registry;
pub mod message;

pub use connection::{CloseSignal, Connection, ConnectionEndpoint, ConnectionState, DeliveryError};
pub use connection_id::ConnectionId;
pub use connection_registry::{BroadcastReport, ConnectionRegistry, RegistrationGuard};
pub use message::Message;
