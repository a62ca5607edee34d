//! WebSocket layer: upgrade handling, per-connection loops, frame mapping.
//!
//! The WebSocket endpoint at `/ws` accepts text and binary frames from
//! clients and streams every broadcast message back to them.

pub mod connection;
pub mod frame;
pub mod handler;
